//! Offline compiler from wallpaper scene packages to a flat render-pass program.
//!
//! - `asset_store`: virtual package + on-disk asset lookup
//! - `scene`: the parsed scene/material/effect contract
//! - `compiler`: shader transpiler, layout engine, buffer pools, pass assembler

pub mod asset_store;
pub mod compiler;
pub mod scene;
