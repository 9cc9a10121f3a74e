//! Property-based tests for the retry control loop using proptest.
//!
//! - Adjusted parameters always stay within their declared bounds
//! - The attempt budget never grows as the history gets longer
//! - Ring buffers keep exactly the most recent samples
//! - No episode starts an attempt that could push spend over the cost limit
