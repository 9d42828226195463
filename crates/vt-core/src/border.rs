/// Out-of-range index policy for filters and samplers.
///
/// `Reflect101` mirrors around the edge pixel without repeating it
/// (`cba|abcd|dcb`), `Reflect` repeats it (`cba|abcd|dcba`).
#[derive(Debug, Clone, PartialEq)]
pub enum BorderMode<T> {
    Clamp,
    Constant(T),
    Reflect,
    Reflect101,
}

impl<T> BorderMode<T> {
    /// Maps a possibly out-of-range index into `[0, len)`.
    ///
    /// Returns `None` for `Constant` outside the range and for empty axes.
    pub fn map(&self, i: isize, len: usize) -> Option<usize> {
        map_index(i, len, self)
    }
}

pub fn map_index<T>(i: isize, len: usize, mode: &BorderMode<T>) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if i >= 0 && (i as usize) < len {
        return Some(i as usize);
    }

    match mode {
        BorderMode::Constant(_) => None,
        BorderMode::Clamp => Some(if i < 0 { 0 } else { len - 1 }),
        BorderMode::Reflect => {
            let period = (2 * len) as isize;
            let r = i.rem_euclid(period) as usize;
            Some(if r < len { r } else { 2 * len - 1 - r })
        }
        BorderMode::Reflect101 => {
            if len == 1 {
                return Some(0);
            }
            let period = (2 * len - 2) as isize;
            let r = i.rem_euclid(period) as usize;
            Some(if r < len { r } else { 2 * len - 2 - r })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BorderMode, map_index};

    #[test]
    fn in_range_indices_pass_through_every_mode() {
        for mode in [
            BorderMode::Clamp,
            BorderMode::Constant(7u8),
            BorderMode::Reflect,
            BorderMode::Reflect101,
        ] {
            for i in 0..4 {
                assert_eq!(mode.map(i, 4), Some(i as usize));
            }
        }
    }

    #[test]
    fn clamp_and_constant_outside() {
        assert_eq!(map_index(-3, 5, &BorderMode::<u8>::Clamp), Some(0));
        assert_eq!(map_index(99, 5, &BorderMode::<u8>::Clamp), Some(4));
        assert_eq!(map_index(-1, 5, &BorderMode::Constant(0u8)), None);
        assert_eq!(map_index(0, 0, &BorderMode::<u8>::Clamp), None);
    }

    #[test]
    fn reflect_variants_on_len4() {
        let r = BorderMode::<u8>::Reflect;
        let r101 = BorderMode::<u8>::Reflect101;

        let expected_reflect = [(-3, 2), (-2, 1), (-1, 0), (4, 3), (5, 2), (6, 1)];
        for (i, e) in expected_reflect {
            assert_eq!(r.map(i, 4), Some(e), "reflect i={i}");
        }

        let expected_101 = [(-3, 3), (-2, 2), (-1, 1), (4, 2), (5, 1), (6, 0)];
        for (i, e) in expected_101 {
            assert_eq!(r101.map(i, 4), Some(e), "reflect101 i={i}");
        }

        for i in -5..=5 {
            assert_eq!(r101.map(i, 1), Some(0));
        }
    }
}
