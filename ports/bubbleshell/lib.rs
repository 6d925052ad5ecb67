/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A generative instrument: bubbles drift, collide, merge and bud inside a
//! bounded world, and their impacts are voiced through an audio backend.

pub mod app;
pub mod audio;
pub mod config;
pub mod physics;
pub mod search;
pub mod sim;
pub mod world;

mod util;

pub use app::{BubbleApp, FrameOutcome};
pub use config::{ControlSettings, ShellConfig};
pub use sim::{FrameSnapshot, Simulation};
