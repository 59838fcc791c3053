// ============================================================================
// spark-observable - Constants
// Limits and labels shared by the store, scheduler and reconciler
// ============================================================================

// =============================================================================
// SCHEDULER LIMITS
// =============================================================================

/// Maximum number of consecutive flushes `settle()` performs before it
/// concludes that watchers keep re-dirtying each other.
pub const DEFAULT_MAX_SETTLE_PASSES: u32 = 1000;

/// Generation counter value before the first flush.
pub const INITIAL_GENERATION: u64 = 0;

/// The first run of a watcher. Consumers compare against this to tell an
/// initial render from a re-render.
pub const FIRST_RUN: u32 = 1;

// =============================================================================
// DIAGNOSTIC LABELS
// =============================================================================

/// How the root node is named in paths and `debug_dump()` output.
pub const ROOT_LABEL: &str = "{json}";

/// Indentation step used by `debug_dump()`.
pub const DUMP_INDENT: &str = "  ";

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_is_one() {
        assert_eq!(FIRST_RUN, 1);
    }

    #[test]
    fn settle_limit_is_reasonable() {
        assert_eq!(DEFAULT_MAX_SETTLE_PASSES, 1000);
        assert_eq!(INITIAL_GENERATION, 0);
    }
}
