use std::f32::consts::PI;

pub fn get_distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    get_distance_squared(x1, y1, x2, y2).sqrt()
}

pub fn get_distance_squared(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    dx * dx + dy * dy
}

pub fn get_direction(to_x: f32, to_y: f32, from_x: f32, from_y: f32) -> f32 {
    (to_y - from_y).atan2(to_x - from_x)
}

/// Smallest absolute angular distance between two headings, in [0, PI].
pub fn get_angle_dist(a: f32, b: f32) -> f32 {
    let p = PI * 2.0;
    let d = ((b - a) % p + p) % p;
    if d > PI { p - d } else { d }
}

/// Segment-vs-AABB intersection test used for swept projectile collision.
/// Liang-Barsky clipping of the segment against the rectangle; touching an
/// edge counts as a hit.
pub fn segment_intersects_rect(
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
) -> bool {
    // Either endpoint inside is an immediate hit.
    if (x0 >= min_x && x0 <= max_x && y0 >= min_y && y0 <= max_y)
        || (x1 >= min_x && x1 <= max_x && y1 >= min_y && y1 <= max_y)
    {
        return true;
    }

    let dx = x1 - x0;
    let dy = y1 - y0;
    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;

    for (d, start, low, high) in [
        (dx, x0, min_x, max_x),
        (dy, y0, min_y, max_y),
    ] {
        if d.abs() < 1e-9 {
            if start < low || start > high {
                return false;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (low - start) * inv;
        let mut t1 = (high - start) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return false;
        }
    }

    true
}

/// Clamps a value into [low, high].
pub fn clamp(value: f32, low: f32, high: f32) -> f32 {
    value.max(low).min(high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_dist_wraps_correctly() {
        assert!((get_angle_dist(0.1, PI * 2.0 - 0.1) - 0.2).abs() < 1e-5);
        assert!((get_angle_dist(0.0, PI) - PI).abs() < 1e-5);
        assert!(get_angle_dist(1.5, 1.5) < 1e-6);
    }

    #[test]
    fn segment_crossing_rect_hits() {
        // Horizontal segment passing straight through the box.
        assert!(segment_intersects_rect(10.0, 10.0, 20.0, 20.0, 0.0, 15.0, 30.0, 15.0));
        // Fully outside, parallel miss.
        assert!(!segment_intersects_rect(10.0, 10.0, 20.0, 20.0, 0.0, 25.0, 30.0, 25.0));
        // Diagonal clip through a corner region.
        assert!(segment_intersects_rect(10.0, 10.0, 20.0, 20.0, 5.0, 15.0, 15.0, 5.0));
    }

    #[test]
    fn segment_endpoint_inside_rect_hits() {
        assert!(segment_intersects_rect(0.0, 0.0, 10.0, 10.0, 5.0, 5.0, 50.0, 50.0));
    }

    #[test]
    fn degenerate_segment_outside_misses() {
        assert!(!segment_intersects_rect(0.0, 0.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0));
    }
}
