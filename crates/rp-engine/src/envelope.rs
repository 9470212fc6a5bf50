//! XM envelope evaluation.

use rp_ir::Envelope;

/// Value of the envelope at tick position `pos`, linearly interpolated in
/// frame space. Positions beyond the last point clamp to its value; an
/// empty envelope is neutral (64).
pub fn envelope_value(env: &Envelope, pos: u16) -> f64 {
    if env.points.is_empty() {
        return 64.0;
    }

    let mut p1 = 0;
    for (i, point) in env.points.iter().enumerate() {
        if point.frame <= pos {
            p1 = i;
        } else {
            break;
        }
    }

    let p2 = p1 + 1;
    if p2 >= env.points.len() {
        return env.points[env.points.len() - 1].value as f64;
    }

    let (x1, y1) = (env.points[p1].frame as f64, env.points[p1].value as f64);
    let (x2, y2) = (env.points[p2].frame as f64, env.points[p2].value as f64);
    if x2 == x1 {
        return y1;
    }
    y1 + (y2 - y1) * (pos as f64 - x1) / (x2 - x1)
}

/// Advance the envelope position by one tick.
///
/// A sustained note holds at the sustain point's frame; a looping envelope
/// wraps positions past the loop end back into the loop region.
pub fn envelope_advance(env: &Envelope, pos: u16, sustained: bool) -> u16 {
    if env.points.is_empty() {
        return pos;
    }

    if sustained && env.sustain_enabled() {
        if let Some(point) = env.points.get(env.sustain_point as usize) {
            if pos >= point.frame {
                return point.frame;
            }
        }
    }

    let mut next = pos.saturating_add(1);

    if env.loop_enabled() {
        let start = env
            .points
            .get(env.loop_start as usize)
            .map_or(0, |p| p.frame);
        let end = env.points.get(env.loop_end as usize).map_or(0, |p| p.frame);
        if end > start && next >= end {
            next = start + (next - start) % (end - start);
        }
    }

    next
}
