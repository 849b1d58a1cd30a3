use approx::assert_relative_eq;
use ndarray::{s, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strided_2d::{
    AsStrided, AsStridedMut, StridedError, StridedMemory, StridedView, StridedViewMut,
};

fn make_buffer(height: usize, width: usize, pitch: usize) -> Vec<f64> {
    (0..height * (width + pitch)).map(|i| i as f64).collect()
}

#[test]
fn test_nested_slices_match_direct_slice() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let height = rng.gen_range(1..9);
        let width = rng.gen_range(1..9);
        let pitch = rng.gen_range(0..4);
        let data = make_buffer(height, width, pitch);
        let view = StridedView::new(&data, 0, height, width, pitch).unwrap();

        let r1 = rng.gen_range(0..height);
        let c1 = rng.gen_range(0..width);
        let h1 = rng.gen_range(1..=height - r1);
        let w1 = rng.gen_range(1..=width - c1);
        let outer = view.slice(r1, c1, h1, w1).unwrap();

        let r2 = rng.gen_range(0..h1);
        let c2 = rng.gen_range(0..w1);
        let h2 = rng.gen_range(0..=h1 - r2);
        let w2 = rng.gen_range(0..=w1 - c2);
        let nested = outer.slice(r2, c2, h2, w2).unwrap();
        let direct = view.slice(r1 + r2, c1 + c2, h2, w2).unwrap();

        assert!(nested.same_region(&direct));
        assert_eq!(nested.stride(), view.stride());
        for i in 0..h2 {
            for j in 0..w2 {
                assert_relative_eq!(nested[(i, j)], view[(r1 + r2 + i, c1 + c2 + j)]);
            }
        }
    }
}

#[test]
fn test_view_matches_ndarray_slicing() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let height = rng.gen_range(1..7);
        let width = rng.gen_range(1..7);
        let pitch = rng.gen_range(0..3);
        let backing = Array2::from_shape_vec(
            (height, width + pitch),
            make_buffer(height, width, pitch),
        )
        .unwrap();
        let expected = backing.slice(s![.., ..width]).to_owned();

        let data = backing.as_slice().unwrap();
        let view = StridedView::new(data, 0, height, width, pitch).unwrap();
        assert_eq!(view.to_array(), expected);

        let columns = backing.slice(s![.., ..width]);
        let from_array = StridedView::from_array2(&columns).unwrap();
        assert_eq!(from_array.as_ptr(), view.as_ptr());
        assert!(from_array.contents_eq(&view));
    }
}

#[test]
fn test_copy_between_pitched_views() {
    let src_data = make_buffer(4, 3, 2);
    let src = StridedView::new(&src_data, 0, 4, 3, 2).unwrap();
    let mut dst_data = vec![f64::NAN; 4 * 5];
    let mut dst = StridedViewMut::new(&mut dst_data, 0, 4, 4, 1).unwrap();
    src.copy_to(&mut dst).unwrap();

    for i in 0..4 {
        for j in 0..3 {
            assert_relative_eq!(dst[(i, j)], src[(i, j)]);
        }
        assert!(dst[(i, 3)].is_nan());
    }
}

#[test]
fn test_cast_pairs_of_floats() {
    let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.5).collect();
    let view = StridedView::new(&data, 0, 3, 2, 2).unwrap();
    let pairs = view.cast::<[f32; 2]>().unwrap();
    assert_eq!(pairs.width(), 1);
    assert_eq!(pairs.pitch(), 1);
    for (row, pair) in pairs.iter().enumerate() {
        assert_relative_eq!(pair[0], view[(row, 0)]);
        assert_relative_eq!(pair[1], view[(row, 1)]);
    }

    let odd = StridedView::new(&data, 0, 3, 3, 1).unwrap();
    assert!(matches!(
        odd.cast::<[f32; 2]>(),
        Err(StridedError::TypeMismatch { .. })
    ));
}

#[test]
fn test_scale_rows_in_place() {
    let mut data = make_buffer(3, 4, 1);
    {
        let mut view = data.as_strided_pitched_mut(0, 3, 4, 1).unwrap();
        for (i, row) in view.rows_mut().enumerate() {
            for x in row.iter_mut() {
                *x *= (i + 1) as f64;
            }
        }
    }
    assert_relative_eq!(data[0], 0.0);
    assert_relative_eq!(data[4], 4.0);
    assert_relative_eq!(data[5], 10.0);
    assert_relative_eq!(data[13], 39.0);
    // trailing pitch of the last row is untouched
    assert_relative_eq!(data[14], 14.0);
}

#[test]
fn test_memory_round_trip_across_threads() {
    let memory = StridedMemory::new(make_buffer(5, 4, 2), 0, 5, 4, 2).unwrap();
    let region = memory.slice(1, 1, 3, 2).unwrap();
    let expected: f64 = region.resolve().unwrap().iter().sum();

    let handle = std::thread::spawn(move || -> f64 { region.resolve().unwrap().iter().sum() });
    let sum = handle.join().unwrap();
    assert_relative_eq!(sum, expected);
    assert_relative_eq!(expected, 7.0 + 8.0 + 13.0 + 14.0 + 19.0 + 20.0);
}

#[test]
fn test_flat_handle_reinterpreted_as_2d() {
    let memory = StridedMemory::from_contiguous(make_buffer(2, 6, 0), 2, 6).unwrap();
    let flat = memory.try_get_flat().unwrap();
    assert_eq!(flat.len(), 12);
    let reshaped = flat.into_strided(0, 3, 3, 1).unwrap();
    let view = reshaped.resolve().unwrap();
    assert_relative_eq!(view[(1, 0)], 4.0);
    assert_relative_eq!(view[(2, 2)], 10.0);
}

#[test]
fn test_slice_extension_over_array_data() {
    let a = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64);
    let data = a.as_slice().unwrap();
    let view = data.as_strided(3, 4).unwrap();
    assert_eq!(view.to_array(), a);
}

#[cfg(feature = "parallel")]
#[test]
fn test_par_rows_matches_serial() {
    use rayon::prelude::*;

    let data = make_buffer(64, 33, 7);
    let view = StridedView::new(&data, 0, 64, 33, 7).unwrap();
    let serial: Vec<f64> = view.rows().map(|row| row.iter().sum()).collect();
    let parallel: Vec<f64> = view.par_rows().map(|row| row.iter().sum()).collect();
    for (a, b) in serial.iter().zip(&parallel) {
        assert_relative_eq!(*a, *b);
    }
}
