/// Arithmetic mean of integer scores. `None` for an empty input, so callers
/// decide what an empty selection means instead of getting a silent 0.0.
///
/// The sum is held in `i128`, which cannot overflow for any realistic
/// number of `i64` scores.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = i64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0i128, 0usize), |(sum, count), v| (sum + i128::from(v), count + 1));
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}
