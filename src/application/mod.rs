// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: validate settings, wire the data
// pipeline to the training loop, persist what a later `infer`
// needs. No tensor math and no printing here.

// The GAN training workflow
pub mod train_use_case;

// Denoising with a saved generator snapshot
pub mod infer_use_case;
