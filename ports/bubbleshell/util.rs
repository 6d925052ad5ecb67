/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::f32::consts::{PI, TAU};

/// Exponential smoothing step from `current` towards `target`.
pub(crate) fn approach(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

/// Like [`approach`] but along the shortest arc between two angles.
pub(crate) fn approach_angle(current: f32, target: f32, factor: f32) -> f32 {
    current + wrap_angle(target - current) * factor
}

/// Wrap an angle into [-PI, PI).
pub(crate) fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Replace NaN or infinite values with zero.
pub(crate) fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
