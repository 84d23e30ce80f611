//! # Blueprint Ingestion
//!
//! Typed schema for the upstream scene plan and the per-scene asset map.
//! Both are validated here, before the assembly pipeline runs, so malformed
//! input surfaces as a [`BlueprintError`](crate::error::BlueprintError)
//! instead of failing deep inside compositing.

pub mod types;

pub use types::{AssetMap, Blueprint, Branding, LogoCorner, MusicHint, Scene, SceneId, VisualPlan};
