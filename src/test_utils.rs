use crate::dimension::from_fn;
use crate::dimension::MVec;

// Used by tests and benches; some helpers are unused in some feature
// configurations.
#[allow(dead_code)]
pub fn assert_float_is_close(x: f64, y: f64) {
    assert!(
        (x - y).abs() < 10.0 * f64::EPSILON * (1.0 + x.abs() + y.abs()),
        "{} {}",
        x,
        y
    )
}

#[allow(dead_code)]
pub fn assert_float_is_close_high_error(x: f64, y: f64) {
    assert!(
        (x - y).abs() < 1e3 * f64::EPSILON * (1.0 + x.abs() + y.abs()),
        "{} {}",
        x,
        y
    )
}

#[allow(dead_code)]
pub fn assert_vec_is_close(x: MVec, y: MVec) {
    assert!(
        (x - y).length() < 10.0 * f64::EPSILON * (1.0 + x.length() + y.length()),
        "{:?} {:?}",
        x,
        y
    )
}

/// A deterministic grid of positions, spaced by one length unit,
/// degenerating gracefully for lower dimensions.
#[allow(dead_code)]
pub fn grid_positions(n: usize, m: usize) -> Vec<MVec> {
    (1..=n)
        .flat_map(move |x| {
            (1..=m).map(move |y| {
                from_fn(|axis| match axis {
                    0 => x as f64,
                    1 => y as f64,
                    _ => (x * y) as f64 / (n as f64),
                })
            })
        })
        .collect()
}
