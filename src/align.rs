/// Rounds the given value up to the next multiple of an alignment.
///
/// The alignment must be a power of two.
///
/// # Examples
///
/// ```rust
/// assert_eq!(rmalloc::round_up!(13usize, 16), 16);
/// assert_eq!(rmalloc::round_up!(32usize, 16), 32);
/// assert_eq!(rmalloc::round_up!(33usize, 16), 48);
/// ```
#[macro_export]
macro_rules! round_up {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[cfg(test)]
mod tests {
  #[test]
  fn test_round_up() {
    let granule = 16usize;

    let mut expectations = Vec::new();

    for i in 0..10 {
      let values = (granule * i + 1)..=(granule * (i + 1));

      let expected = granule * (i + 1);

      expectations.push((values, expected));
    }

    for (values, expected) in expectations {
      for value in values {
        assert_eq!(expected, round_up!(value, granule));
      }
    }
  }

  #[test]
  fn test_round_up_zero() {
    assert_eq!(0, round_up!(0usize, 16));
  }

  #[test]
  fn test_round_up_other_alignments() {
    assert_eq!(8, round_up!(5usize, 8));
    assert_eq!(4096, round_up!(4095usize, 4096));
    assert_eq!(4096, round_up!(4096usize, 4096));
  }
}
