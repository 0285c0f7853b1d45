// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the training
// driver works with:
//
//   batch.rs   — host-side mini-batch pairs and image planes
//   losses.rs  — scalar loss terms and the lambda weighting
//   traits.rs  — the dataset read contract and batch sources
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, and traits

// A co-registered (noisy, clean) mini-batch in host memory
pub mod batch;

// Loss scalars and their weighted combination
pub mod losses;

// Core abstractions that the data layer implements
pub mod traits;
