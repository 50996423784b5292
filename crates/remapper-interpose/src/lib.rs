//! Component B/C: the injected dynamic library.
//!
//! This crate is loaded into an arbitrary host process via
//! `DYLD_INSERT_LIBRARIES` (macOS) or `LD_PRELOAD` (Linux); its entire job
//! is replacing libc entry points with rewriting wrappers, which is
//! unsafe-by-nature FFI from top to bottom. The workspace's blanket
//! `unsafe_code = "deny"` lint is relaxed crate-wide here rather than
//! function-by-function, since nearly every item in it touches raw
//! pointers or `extern "C"` boundaries.
#![allow(unsafe_code)]

mod exec;
mod fs;
mod path;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;
