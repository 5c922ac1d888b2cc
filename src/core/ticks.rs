//! Tick values for axes: a 1-2-5 ladder on uniform scales, decades with
//! their 2..9 multiples on log scales.

use crate::core::AxisScale;

/// Minor divisions between two major ticks on uniform scales.
pub const MINOR_DIVISIONS: i64 = 5;

/// Major and minor tick values inside an axis range, ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisTicks {
    pub major: Vec<f64>,
    pub minor: Vec<f64>,
}

/// Smallest step on the 1-2-5 ladder that splits `span` into at most
/// `target` intervals.
#[must_use]
pub fn nice_step(span: f64, target: usize) -> Option<f64> {
    if !span.is_finite() || span <= 0.0 || target == 0 {
        return None;
    }
    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|multiple| multiple * magnitude)
        .find(|step| *step >= raw)
        .filter(|step| step.is_finite() && *step > 0.0)
}

#[must_use]
pub fn axis_ticks(scale: &AxisScale, range: (f64, f64), target: usize) -> AxisTicks {
    let (min, max) = (range.0.min(range.1), range.0.max(range.1));
    match scale {
        AxisScale::Log10 if min > 0.0 => log_ticks(min, max, target),
        _ => linear_ticks(min, max, target),
    }
}

fn linear_ticks(min: f64, max: f64, target: usize) -> AxisTicks {
    let mut ticks = AxisTicks::default();
    let Some(step) = nice_step(max - min, target) else {
        return ticks;
    };
    let minor_step = step / MINOR_DIVISIONS as f64;
    let (first, last) = ((min / minor_step).ceil() as i64, (max / minor_step).floor() as i64);
    for index in first..=last {
        let value = index as f64 * minor_step;
        if index.rem_euclid(MINOR_DIVISIONS) == 0 {
            ticks.major.push(value);
        } else {
            ticks.minor.push(value);
        }
    }
    ticks
}

fn log_ticks(min: f64, max: f64, target: usize) -> AxisTicks {
    let mut ticks = AxisTicks::default();
    if !min.is_finite() || !max.is_finite() || min >= max || target == 0 {
        return ticks;
    }
    let (first, last) = (min.log10().floor() as i32, max.log10().ceil() as i32);
    let decades = (last - first).max(1) as usize;
    let stride = decades.div_ceil(target).max(1) as i32;
    let inside = |value: f64| value >= min && value <= max;
    for exp in first..=last {
        let decade = 10f64.powi(exp);
        if (exp - first) % stride == 0 && inside(decade) {
            ticks.major.push(decade);
        }
        if stride == 1 {
            ticks
                .minor
                .extend((2..10).map(|k| f64::from(k) * decade).filter(|v| inside(*v)));
        }
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::{axis_ticks, nice_step};
    use crate::core::AxisScale;

    #[test]
    fn steps_follow_the_one_two_five_ladder() {
        assert_eq!(nice_step(10.0, 2), Some(5.0));
        assert_eq!(nice_step(10.0, 4), Some(5.0));
        assert_eq!(nice_step(1.0, 5), Some(0.2));
        assert_eq!(nice_step(0.0, 5), None);
    }

    #[test]
    fn linear_ticks_split_majors_into_five() {
        let ticks = axis_ticks(&AxisScale::Linear, (0.0, 10.0), 2);
        assert_eq!(ticks.major, vec![0.0, 5.0, 10.0]);
        assert_eq!(ticks.minor, vec![1.0, 2.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn log_ticks_use_decades() {
        let ticks = axis_ticks(&AxisScale::Log10, (1.0, 100.0), 5);
        assert_eq!(ticks.major, vec![1.0, 10.0, 100.0]);
        assert_eq!(ticks.minor.len(), 16);
        assert_eq!(ticks.minor[0], 2.0);
    }
}
