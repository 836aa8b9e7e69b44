// =============================================================================
// Signals Module
// =============================================================================
//
// The aggregator is the entire signal-processing pipeline this system needs:
// combine per-indicator results (plus the independent DOM microstructure
// reading) into one bounded, classified Signal per spec.md §4.2.

pub mod aggregator;

pub use aggregator::{aggregate, Action, Caps, Classification, ConfidencePenalties, Signal};
