// Collocation against the 5x3 reference grid and its variants.
// The linear kernel doubles as the test bed for most of the
// orchestrator behaviour, mirroring how the cell lookups compose.

use approx::assert_abs_diff_eq;
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{array, Array, Array1};

use ndarray_colloc::{
    collocate, collocate_list, CollocationError, CollocationOptions, Coordinate, GriddedData,
    HybridCoordinate, Metadata, SamplePoints, SourceData, SubsetConstraint, UngriddedData,
};

fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// lat [-10, 10] x lon [-5, 5] with values 1..=15 in row-major order
fn square_5x3(offset: f64) -> GriddedData {
    let lat = Coordinate::new("latitude", Array::linspace(-10.0, 10.0, 5), "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", Array::linspace(-5.0, 5.0, 3), "degrees_east").unwrap();
    let data = (Array::linspace(1.0, 15.0, 15) + offset)
        .into_shape_with_order((5, 3))
        .unwrap()
        .into_dyn();
    GriddedData::new(data, vec![lat, lon], Metadata::new("rainfall_rate", "kg m-2 s-1")).unwrap()
}

fn square_5x3_source() -> SourceData {
    SourceData::from(square_5x3(0.0))
}

/// the 5x3 grid extended by a time axis of three days
fn square_5x3_with_time() -> SourceData {
    let lat = Coordinate::new("latitude", Array::linspace(-10.0, 10.0, 5), "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", Array::linspace(-5.0, 5.0, 3), "degrees_east").unwrap();
    let time = Coordinate::new("time", array![0.0, 1.0, 2.0], "days since 1984-08-27 00:00:00").unwrap();
    let data = Array::from_iter((0..45).map(|v| v as f64 + 1.0))
        .into_shape_with_order((5, 3, 3))
        .unwrap()
        .into_dyn();
    SourceData::from(
        GriddedData::new(data, vec![lat, lon, time], Metadata::new("rainfall_rate", "kg m-2 s-1"))
            .unwrap(),
    )
}

#[test]
fn nearest_neighbour_in_2d() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0, 4.0, -4.0])
        .longitude(array![1.0, 4.0, -4.0])
        .build()
        .unwrap();

    let output = collocate(&sample, &square_5x3_source(), None, "nn", CollocationOptions::new())
        .unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].values, array![8.0, 12.0, 4.0]);
    assert!(!output[0].mask.iter().any(|&m| m));
}

#[test]
fn nearest_neighbour_on_a_grid_point() {
    // the sample point already exists on the grid, which must not be a
    // problem
    let sample = SamplePoints::builder()
        .latitude(array![0.0])
        .longitude(array![0.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &square_5x3_source(), None, "nn", CollocationOptions::new())
        .unwrap();
    assert_eq!(output[0].values[0], 8.0);
}

#[test]
fn nearest_neighbour_exactly_between_grid_points() {
    // a point on the boundary belongs to the cell whose upper bound it
    // equals
    let sample = SamplePoints::builder()
        .latitude(array![2.5, -2.5, 2.5, -2.5])
        .longitude(array![2.5, 2.5, -2.5, -2.5])
        .build()
        .unwrap();
    let output = collocate(&sample, &square_5x3_source(), None, "nn", CollocationOptions::new())
        .unwrap();
    assert_eq!(output[0].values, array![8.0, 5.0, 7.0, 4.0]);
}

#[test]
fn linear_in_2d() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0, 4.0, -4.0])
        .longitude(array![1.0, 4.0, -4.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &square_5x3_source(), None, "lin", CollocationOptions::new())
        .unwrap();
    assert_abs_diff_eq!(output[0].values[0], 8.8, epsilon = 1e-12);
    assert_abs_diff_eq!(output[0].values[1], 11.2, epsilon = 1e-12);
    assert_abs_diff_eq!(output[0].values[2], 4.8, epsilon = 1e-12);
}

#[test]
fn out_of_bounds_masked_without_extrapolation() {
    let sample = SamplePoints::builder()
        .latitude(array![5.5, -5.5, 5.5, -5.5])
        .longitude(array![5.5, 5.5, -5.5, -5.5])
        .build()
        .unwrap();
    let source = square_5x3_source();

    let masked = collocate(&sample, &source, None, "nn", CollocationOptions::new()).unwrap();
    assert!(masked[0].mask.iter().all(|&m| m));
    assert!(masked[0].values.iter().all(|v| v.is_nan()));

    let filled = collocate(
        &sample,
        &source,
        None,
        "nn",
        CollocationOptions::new().extrapolate(true),
    )
    .unwrap();
    assert_eq!(filled[0].values, array![12.0, 6.0, 10.0, 4.0]);
    assert!(!filled[0].mask.iter().any(|&m| m));
}

#[test]
fn linear_extrapolation_continues_the_edge_slope() {
    let sample = SamplePoints::builder()
        .latitude(array![11.0])
        .longitude(array![0.0])
        .build()
        .unwrap();
    let source = square_5x3_source();

    let masked = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert!(masked[0].mask[0]);

    let output = collocate(
        &sample,
        &source,
        None,
        "lin",
        CollocationOptions::new().extrapolate(true),
    )
    .unwrap();
    // one cell height past the last latitude row: 11 + 1.2 * (14 - 11)
    assert_abs_diff_eq!(output[0].values[0], 14.6, epsilon = 1e-12);
}

#[test]
fn fill_value_replaces_the_mask_flag() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0, 20.0])
        .longitude(array![1.0, 1.0])
        .build()
        .unwrap();
    let output = collocate(
        &sample,
        &square_5x3_source(),
        None,
        "nn",
        CollocationOptions::new().fill_value(-999.0),
    )
    .unwrap();
    assert_eq!(output[0].values, array![8.0, -999.0]);
    assert!(!output[0].mask.iter().any(|&m| m));
}

#[test]
fn missing_data_for_missing_sample() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0, 3.0, -1.0])
        .longitude(array![1.0, 3.0, -1.0])
        .mask(array![false, true, false])
        .build()
        .unwrap();
    let source = square_5x3_source();

    let output = collocate(
        &sample,
        &source,
        None,
        "nn",
        CollocationOptions::new().missing_data_for_missing_sample(true),
    )
    .unwrap();
    assert_eq!(output[0].mask, array![false, true, false]);
    assert_eq!(output[0].values[0], 8.0);
    assert_eq!(output[0].values[2], 8.0);

    let output = collocate(
        &sample,
        &source,
        None,
        "nn",
        CollocationOptions::new().missing_data_for_missing_sample(false),
    )
    .unwrap();
    assert!(!output[0].mask.iter().any(|&m| m));
    assert_eq!(output[0].values, array![8.0, 12.0, 8.0]);
}

#[test]
fn collocation_with_a_time_axis() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0])
        .longitude(array![1.0])
        .datetimes(&[datetime(1984, 8, 28, 8, 34)])
        .build()
        .unwrap();
    let source = square_5x3_with_time();

    let nearest = collocate(&sample, &source, None, "nn", CollocationOptions::new()).unwrap();
    assert_eq!(nearest[0].values[0], 23.0);

    let linear = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    let day_fraction = (8.0 * 3600.0 + 34.0 * 60.0) / 86400.0;
    assert_abs_diff_eq!(
        linear[0].values[0],
        23.0 + 0.2 * 9.0 + 0.2 * 3.0 + day_fraction,
        epsilon = 1e-9
    );
}

#[test]
fn scalar_time_axis_is_permissive() {
    // collocation proceeds even when the query time lies far outside
    // the scalar coordinate
    let lat = Coordinate::new("latitude", Array::linspace(-10.0, 10.0, 5), "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", Array::linspace(-5.0, 5.0, 3), "degrees_east").unwrap();
    let time = Coordinate::new("time", array![0.0], "days since 1984-08-27 00:00:00").unwrap();
    let data = Array::linspace(1.0, 15.0, 15)
        .into_shape_with_order((5, 3, 1))
        .unwrap()
        .into_dyn();
    let source = SourceData::from(
        GriddedData::new(data, vec![lat, lon, time], Metadata::new("rainfall_rate", "")).unwrap(),
    );

    let sample = SamplePoints::builder()
        .latitude(array![1.0, 4.0, -4.0])
        .longitude(array![1.0, 4.0, -4.0])
        .datetimes(&[
            datetime(1984, 8, 22, 0, 0),
            datetime(1984, 8, 28, 0, 0),
            datetime(1984, 10, 1, 0, 0),
        ])
        .build()
        .unwrap();

    let output = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert_abs_diff_eq!(output[0].values[0], 8.8, epsilon = 1e-12);
    assert_abs_diff_eq!(output[0].values[1], 11.2, epsilon = 1e-12);
    assert_abs_diff_eq!(output[0].values[2], 4.8, epsilon = 1e-12);
}

/// lat [0, 10] x lon [0, 90, 180, 270] circular, values 1..=8
fn circular_source() -> SourceData {
    let lat = Coordinate::new("latitude", array![0.0, 10.0], "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", array![0.0, 90.0, 180.0, 270.0], "degrees_east")
        .unwrap()
        .with_circular()
        .unwrap();
    let data = Array::linspace(1.0, 8.0, 8)
        .into_shape_with_order((2, 4))
        .unwrap()
        .into_dyn();
    SourceData::from(GriddedData::new(data, vec![lat, lon], Metadata::new("tas", "K")).unwrap())
}

#[test]
fn circular_longitude_wrap_idempotence() {
    let source = circular_source();
    for kernel in ["nn", "lin"] {
        let base = collocate(
            &SamplePoints::builder()
                .latitude(array![5.0])
                .longitude(array![45.0])
                .build()
                .unwrap(),
            &source,
            None,
            kernel,
            CollocationOptions::new(),
        )
        .unwrap();
        for lon in [405.0, -315.0] {
            let shifted = collocate(
                &SamplePoints::builder()
                    .latitude(array![5.0])
                    .longitude(array![lon])
                    .build()
                    .unwrap(),
                &source,
                None,
                kernel,
                CollocationOptions::new(),
            )
            .unwrap();
            assert_abs_diff_eq!(shifted[0].values[0], base[0].values[0], epsilon = 1e-12);
        }
    }
}

#[test]
fn circular_longitude_seam() {
    let source = circular_source();

    // 315 sits exactly between 270 and 360: the tie goes to the cell
    // around 270
    let sample = SamplePoints::builder()
        .latitude(array![0.0, 0.0])
        .longitude(array![315.0, 316.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &source, None, "nn", CollocationOptions::new()).unwrap();
    assert_eq!(output[0].values, array![4.0, 1.0]);

    // linear blending across the seam
    let sample = SamplePoints::builder()
        .latitude(array![5.0])
        .longitude(array![300.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert_abs_diff_eq!(output[0].values[0], 5.0, epsilon = 1e-12);
}

#[test]
fn storage_order_does_not_matter() {
    let source = square_5x3_with_time();
    let gridded = source.as_gridded().unwrap().clone();

    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(64);
    let n = 20;
    let lats: Array1<f64> = (0..n).map(|_| rng.random_range(-11.0..11.0)).collect();
    let lons: Array1<f64> = (0..n).map(|_| rng.random_range(-6.0..6.0)).collect();
    let times: Array1<f64> = (0..n).map(|_| rng.random_range(-0.5..2.5)).collect();
    let sample = SamplePoints::builder()
        .latitude(lats)
        .longitude(lons)
        .time(times)
        .build()
        .unwrap();

    for kernel in ["nn", "lin"] {
        let reference =
            collocate(&sample, &source, None, kernel, CollocationOptions::new()).unwrap();
        for order in [[2, 1, 0], [1, 0, 2], [2, 0, 1]] {
            let transposed =
                SourceData::from(gridded.clone().transposed(&order).unwrap());
            let output =
                collocate(&sample, &transposed, None, kernel, CollocationOptions::new()).unwrap();
            assert_eq!(output[0].mask, reference[0].mask);
            for (&a, &b) in output[0].values.iter().zip(reference[0].values.iter()) {
                if !a.is_nan() || !b.is_nan() {
                    assert_abs_diff_eq!(a, b, epsilon = 1e-9);
                }
            }
        }
    }
}

#[test]
fn multi_variable_collocation() {
    let sources = [
        SourceData::from(square_5x3(0.0)),
        SourceData::from(square_5x3(100.0)),
    ];
    let sample = SamplePoints::builder()
        .latitude(array![1.0, 4.0, -4.0])
        .longitude(array![1.0, 4.0, -4.0])
        .build()
        .unwrap();

    let outputs =
        collocate_list(&sample, &sources, None, "lin", CollocationOptions::new()).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_abs_diff_eq!(outputs[0].values[0], 8.8, epsilon = 1e-12);
    assert_abs_diff_eq!(outputs[1].values[0], 108.8, epsilon = 1e-12);
    assert_abs_diff_eq!(outputs[1].values[1], 111.2, epsilon = 1e-12);
}

/// lat [0, 10] x lon [0, 10] x three hybrid height levels
///
/// values count up over (lat, lon, level); the altitude field is
/// `delta + orography` per level
fn hybrid_height_source() -> SourceData {
    let lat = Coordinate::new("latitude", array![0.0, 10.0], "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", array![0.0, 10.0], "degrees_east").unwrap();
    let lev = Coordinate::new("model_level_number", array![0.0, 1.0, 2.0], "1").unwrap();
    let data = Array::from_iter((0..12).map(|v| v as f64))
        .into_shape_with_order((2, 2, 3))
        .unwrap()
        .into_dyn();
    let orography = array![[0.0, 10.0], [20.0, 30.0]].into_dyn();
    let altitude = HybridCoordinate::hybrid_height(
        &array![100.0, 200.0, 400.0],
        &array![1.0, 1.0, 1.0],
        "model_level_number",
        &orography,
        &["latitude", "longitude"],
    )
    .unwrap();
    SourceData::from(
        GriddedData::new(data, vec![lat, lon, lev], Metadata::new("mass_fraction", "1"))
            .unwrap()
            .with_hybrid(altitude)
            .unwrap(),
    )
}

#[test]
fn hybrid_altitude_profiles_vary_by_location() {
    let source = hybrid_height_source();

    // profile at (0, 0) is [100, 200, 400], at (10, 10) it is
    // [130, 230, 430]
    let sample = SamplePoints::builder()
        .latitude(array![0.0, 10.0])
        .longitude(array![0.0, 10.0])
        .altitude(array![150.0, 330.0])
        .build()
        .unwrap();

    let linear = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert_abs_diff_eq!(linear[0].values[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(linear[0].values[1], 10.5, epsilon = 1e-12);

    // 150 sits exactly between the first two levels of the (0, 0)
    // profile: the tie goes to the lower level
    let nearest = collocate(&sample, &source, None, "nn", CollocationOptions::new()).unwrap();
    assert_eq!(nearest[0].values[0], 0.0);
}

#[test]
fn hybrid_altitude_extrapolation() {
    let source = hybrid_height_source();
    let sample = SamplePoints::builder()
        .latitude(array![0.0])
        .longitude(array![0.0])
        .altitude(array![500.0])
        .build()
        .unwrap();

    let masked = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert!(masked[0].mask[0]);

    let output = collocate(
        &sample,
        &source,
        None,
        "lin",
        CollocationOptions::new().extrapolate(true),
    )
    .unwrap();
    assert_abs_diff_eq!(output[0].values[0], 2.5, epsilon = 1e-12);
}

#[test]
fn redundant_sample_pressure_is_ignored() {
    // the source vertical is altitude, so the sample's pressure values
    // must not participate
    let source = hybrid_height_source();
    let sample = SamplePoints::builder()
        .latitude(array![0.0])
        .longitude(array![0.0])
        .altitude(array![150.0])
        .air_pressure(array![10000.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert_abs_diff_eq!(output[0].values[0], 0.5, epsilon = 1e-12);
}

#[test]
fn pressure_only_samples_on_altitude_source_fail() {
    let source = hybrid_height_source();
    let sample = SamplePoints::builder()
        .latitude(array![0.0])
        .longitude(array![0.0])
        .air_pressure(array![10000.0])
        .build()
        .unwrap();
    let err = collocate(&sample, &source, None, "lin", CollocationOptions::new());
    assert!(matches!(err, Err(CollocationError::CoordinateResolution(_))));
}

#[test]
fn hybrid_pressure_with_descending_profiles() {
    let lat = Coordinate::new("latitude", array![0.0, 10.0], "degrees_north").unwrap();
    let lon = Coordinate::new("longitude", array![0.0, 10.0], "degrees_east").unwrap();
    let lev = Coordinate::new("model_level_number", array![0.0, 1.0, 2.0], "1").unwrap();
    let data = Array::from_iter((0..12).map(|v| v as f64))
        .into_shape_with_order((2, 2, 3))
        .unwrap()
        .into_dyn();
    let surface_pressure = array![[100000.0, 100000.0], [100000.0, 100000.0]].into_dyn();
    let pressure = HybridCoordinate::hybrid_pressure(
        &array![4000.0, 2000.0, 1000.0],
        &array![0.0, 0.0, 0.0],
        "model_level_number",
        &surface_pressure,
        &["latitude", "longitude"],
    )
    .unwrap();
    let source = SourceData::from(
        GriddedData::new(data, vec![lat, lon, lev], Metadata::new("mass_fraction", "1"))
            .unwrap()
            .with_hybrid(pressure)
            .unwrap(),
    );

    let sample = SamplePoints::builder()
        .latitude(array![0.0, 0.0])
        .longitude(array![0.0, 0.0])
        .air_pressure(array![1500.0, 1501.0])
        .build()
        .unwrap();

    let linear = collocate(&sample, &source, None, "lin", CollocationOptions::new()).unwrap();
    assert_abs_diff_eq!(linear[0].values[0], 1.5, epsilon = 1e-12);

    // on a falling profile the boundary value belongs to the
    // smaller-value level
    let nearest = collocate(&sample, &source, None, "nn", CollocationOptions::new()).unwrap();
    assert_eq!(nearest[0].values[0], 2.0);
    assert_eq!(nearest[0].values[1], 1.0);
}

#[test]
fn ungridded_sources_cannot_be_collocated() {
    let points = SamplePoints::builder()
        .latitude(array![0.0, 1.0])
        .longitude(array![0.0, 1.0])
        .build()
        .unwrap();
    let source = SourceData::from(
        UngriddedData::new(points, array![1.0, 2.0].into_dyn(), Metadata::new("aod", "1")).unwrap(),
    );
    let sample = SamplePoints::builder()
        .latitude(array![0.5])
        .longitude(array![0.5])
        .build()
        .unwrap();
    let err = collocate(&sample, &source, None, "nn", CollocationOptions::new());
    assert!(matches!(err, Err(CollocationError::CoordinateResolution(_))));
}

#[test]
fn unknown_kernel_name() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0])
        .longitude(array![1.0])
        .build()
        .unwrap();
    let err = collocate(&sample, &square_5x3_source(), None, "cubic", CollocationOptions::new());
    assert!(matches!(err, Err(CollocationError::UnknownKernel(_))));
}

#[test]
fn constraint_applies_before_interpolation() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0])
        .longitude(array![1.0])
        .build()
        .unwrap();
    let source = square_5x3_source();

    // a constraint that keeps the neighbourhood leaves the result
    // unchanged
    let constraint = SubsetConstraint::new().with_range("y", -5.0, 5.0);
    let output = collocate(&sample, &source, Some(&constraint), "nn", CollocationOptions::new())
        .unwrap();
    assert_eq!(output[0].values[0], 8.0);

    // a constraint that excludes everything fails the call
    let constraint = SubsetConstraint::new().with_range("y", 100.0, 200.0);
    let err = collocate(&sample, &source, Some(&constraint), "nn", CollocationOptions::new());
    assert!(matches!(err, Err(CollocationError::EmptySubset(_))));
}

#[test]
fn output_carries_provenance() {
    let sample = SamplePoints::builder()
        .latitude(array![1.0])
        .longitude(array![1.0])
        .build()
        .unwrap();
    let output = collocate(&sample, &square_5x3_source(), None, "nn", CollocationOptions::new())
        .unwrap();
    assert!(output[0].history.contains("Collocated using ndarray-colloc version"));
    assert!(output[0].history.contains("variable: rainfall_rate"));
    assert!(output[0].history.contains("kernel: nn"));
    assert_eq!(output[0].name, "rainfall_rate");
}
