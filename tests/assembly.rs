//! Assembly Integration Tests
//!
//! History → fit → assembled function → forecast profile, plus reference
//! point offsets resolved against a real profile.

use chrono::NaiveDate;
use prodcast::{
    dateline, forecast_profile, AssembledFunction, Axis, CurveFitSettings, DeclineLaw, EngineError, FitMethod,
    ForecastAxis, Frequency, Merge, Model, ModelEntry, Phase, Profile, Quantity, ReferencePoint, SampleSet,
    SeriesId, SolverSettings, Stream,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn declining_well() -> Profile {
    let dates = dateline(date(2022, 1, 1), date(2024, 1, 1), Frequency::Monthly).unwrap();
    let mut p = Profile::allocate(&dates).unwrap();
    let oil = p.times().iter().map(|t| 100.0 * (-0.001 * t).exp()).collect();
    p.set_potential(Phase::Oil, oil).unwrap();
    p.fill_uptimes(1.0).unwrap();
    p
}

fn fitted_decline(profile: &Profile) -> Model {
    let samples = SampleSet::from_profile(profile, SeriesId::Time, SeriesId::Potential(Quantity::Oil)).unwrap();
    let mut model = Model::dca_time(samples);
    model
        .find_fit(FitMethod::Decline(DeclineLaw::Exponential), None, &CurveFitSettings::default())
        .unwrap();
    model
}

fn plateau(value: f64) -> Model {
    let samples = SampleSet::new(vec![0.0, 1.0], vec![value, value], false).unwrap();
    let mut model = Model::history(samples);
    model.find_fit(FitMethod::History, None, &CurveFitSettings::default()).unwrap();
    model
}

#[test]
fn forecast_continues_history() {
    let history = declining_well();
    let model = fitted_decline(&history);
    let start = *history.times().last().unwrap();

    let g = AssembledFunction::assemble(vec![ModelEntry::new(model)], ReferencePoint::None, None).unwrap();
    let dates = dateline(date(2024, 1, 1), date(2025, 1, 1), Frequency::Monthly).unwrap();
    let mut forecast = forecast_profile(&g, Phase::Oil, &dates, ForecastAxis::Time, start).unwrap();
    forecast.set_offset(&history);

    let expected_first = 100.0 * (-0.001 * start).exp();
    assert!((forecast.oil_potential()[0] - expected_first).abs() < 1e-6);
    assert!(forecast.oil_potential().windows(2).all(|w| w[1] < w[0]));
    assert!(forecast.uptime(Stream::Production).iter().all(|u| *u == 1.0));

    let history_end = *history.oil_cumulative().last().unwrap();
    assert!((forecast.oil_cumulative()[0] - history_end).abs() < 1e-12);
}

#[test]
fn y_reference_point_locates_crossing() {
    let reference = declining_well();
    let model = fitted_decline(&reference);
    let point = ReferencePoint::Specific { axis: Axis::Y, value: 60.0 };
    let mut g = AssembledFunction::assemble(vec![ModelEntry::new(model)], point, None).unwrap();

    let x0 = g
        .calculate_offset(
            SeriesId::Time,
            SeriesId::Potential(Quantity::Oil),
            &reference,
            &SolverSettings::default(),
        )
        .unwrap();
    let exact = (100.0_f64 / 60.0).ln() / 0.001;
    assert!((x0 - exact).abs() < 0.5, "x0 = {} exact = {}", x0, exact);
    assert_eq!(g.x0(), x0);

    // The model restarts at the offset
    assert!((g.evaluate(x0).unwrap() - 100.0).abs() < 1e-6);
    assert!(matches!(g.evaluate(x0 - 1.0), Err(EngineError::Limit(_))));
}

#[test]
fn unreachable_reference_value_fails_to_converge() {
    let reference = declining_well();
    let point = ReferencePoint::Specific { axis: Axis::Y, value: 10.0 };
    let mut g = AssembledFunction::assemble(vec![ModelEntry::new(plateau(1.0))], point, None).unwrap();
    let result = g.calculate_offset(
        SeriesId::Time,
        SeriesId::Potential(Quantity::Oil),
        &reference,
        &SolverSettings::default(),
    );
    assert!(matches!(result, Err(EngineError::Convergence(_))));
}

#[test]
fn plateau_blends_into_decline() {
    let decline = fitted_decline(&declining_well());
    let (mp, rate) = (200.0, 50.0);
    let entries = vec![
        ModelEntry::new(plateau(100.0)),
        ModelEntry::new(decline.clone()).with_merge(Merge::smooth(mp, rate)),
    ];
    let g = AssembledFunction::assemble(entries, ReferencePoint::None, Some(3650.0)).unwrap();

    let f_next = |x: f64| decline.evaluate_local(x).unwrap();
    assert!((g.evaluate(mp).unwrap() - 100.0).abs() < 1e-9);
    assert!((g.evaluate(mp + rate).unwrap() - f_next(mp + rate)).abs() < 1e-9);
    for alpha in [0.2, 0.5, 0.8] {
        let x = mp + alpha * rate;
        let expected = (1.0 - alpha) * 100.0 + alpha * f_next(x);
        assert!((g.evaluate(x).unwrap() - expected).abs() < 1e-9);
    }
    assert!(g.evaluate(3651.0).is_err());
}

#[test]
fn unfitted_model_cannot_be_assembled() {
    let samples = SampleSet::new(vec![0.0, 1.0], vec![1.0, 1.0], false).unwrap();
    let result = AssembledFunction::assemble(
        vec![ModelEntry::new(Model::dca_time(samples))],
        ReferencePoint::None,
        None,
    );
    assert!(matches!(result, Err(EngineError::Assemble(_))));
}
