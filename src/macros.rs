// ============================================================================
// spark-observable - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// # Usage
///
/// ```rust
/// use spark_observable::{cloned, read, watch, Node, ReadingValue};
///
/// let a = Node::root(1);
/// let b = Node::root(2);
///
/// let sum = ReadingValue::getter(cloned!(a, b => move || {
///     read(&a).as_i64().unwrap_or(0) + read(&b).as_i64().unwrap_or(0)
/// }));
/// let _w = watch(sum, |total, _| assert_eq!(total, 3));
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Build a getter `ReadingValue` that captures clones of the listed nodes.
///
/// # Usage
///
/// ```rust
/// use spark_observable::{getter, read, watch, Node};
///
/// let name = Node::root("Ada");
/// let greeting = getter!(name => format!("Hello, {}", read(&name).as_str().unwrap_or("")));
/// let _w = watch(greeting, |text: String, _| assert_eq!(text, "Hello, Ada"));
/// ```
#[macro_export]
macro_rules! getter {
    ($($deps:ident),+ => $body:expr) => {
        $crate::ReadingValue::getter($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::ReadingValue::getter(move || $body)
    };
}
