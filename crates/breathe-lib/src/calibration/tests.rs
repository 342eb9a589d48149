//! Tests for the calibration engine

use super::*;
use crate::classifier::RiskCategory;
use chrono::TimeZone;

const EPS: f64 = 1e-9;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 5, 9, 0, 0).unwrap()
}

fn raw(values: &[f64], model_error: f64) -> RawForecast {
    RawForecast {
        entity_id: "Mumbai".to_string(),
        issued_at: now(),
        horizon_days: values.len(),
        values: values.to_vec(),
        model_error,
    }
}

fn anchor(aqi: f64) -> Anchor {
    Anchor::new("Mumbai", now() - chrono::Duration::hours(1), aqi)
}

/// w_min 0.2, w_max 0.8, linear up to 60 AQI of error, decay 0.5
fn engine() -> CalibrationEngine {
    CalibrationEngine::new(CalibrationConfig::default()).unwrap()
}

fn engine_with(f: impl FnOnce(&mut CalibrationConfig)) -> CalibrationEngine {
    let mut config = CalibrationConfig::default();
    f(&mut config);
    CalibrationEngine::new(config).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_anchor_and_trend_scenario() {
    let engine = engine();
    // error 20 on a 60 ceiling puts w a third of the way from 0.2 to 0.8
    let forecast = engine
        .calibrate_at(&raw(&[120.0, 130.0, 140.0], 20.0), Some(&anchor(150.0)), now())
        .unwrap();

    let days = forecast.days();
    assert_close(days[0].blend_weight, 0.4);
    assert_close(days[0].corrected_value, 132.0);
    assert_close(days[1].corrected_value, 136.0);
    assert_close(days[2].corrected_value, 143.0);
    assert!(days
        .iter()
        .all(|d| d.category == RiskCategory::Moderate));
    assert_eq!(forecast.anchor_used, Some(anchor(150.0)));
}

#[test]
fn test_missing_anchor_returns_raw_values() {
    let engine = engine();
    let forecast = engine
        .calibrate_at(&raw(&[120.0, 130.0, 140.0], 20.0), None, now())
        .unwrap();

    assert_eq!(forecast.corrected_values(), vec![120.0, 130.0, 140.0]);
    assert!(forecast.days().iter().all(|d| d.blend_weight == 0.0));
    assert!(forecast.anchor_used.is_none());
    assert!(forecast.is_degraded());
}

#[test]
fn test_categories_follow_breakpoint_table() {
    let engine = engine();
    let values = [10.0, 75.0, 180.0, 250.0, 350.0, 480.0];
    let forecast = engine.calibrate_at(&raw(&values, 5.0), None, now()).unwrap();

    for day in forecast.days() {
        let (category, advisory) = classify(day.corrected_value);
        assert_eq!(day.category, category);
        assert_eq!(day.advisory, advisory);
    }
    assert_eq!(forecast.days()[5].category, RiskCategory::Severe);
}

#[test]
fn test_stale_anchor_is_treated_as_absent() {
    let engine = engine();
    let stale = Anchor::new("Mumbai", now() - chrono::Duration::hours(25), 300.0);
    let forecast = engine
        .calibrate_at(&raw(&[120.0, 130.0], 20.0), Some(&stale), now())
        .unwrap();

    assert!(forecast.anchor_used.is_none());
    assert_eq!(forecast.corrected_values(), vec![120.0, 130.0]);
}

#[test]
fn test_anchor_at_freshness_boundary_is_used() {
    let engine = engine();
    let edge = Anchor::new("Mumbai", now() - chrono::Duration::hours(24), 150.0);
    let forecast = engine
        .calibrate_at(&raw(&[120.0], 20.0), Some(&edge), now())
        .unwrap();
    assert!(forecast.anchor_used.is_some());
}

#[test]
fn test_anchor_for_other_entity_is_ignored() {
    let engine = engine();
    let other = Anchor::new("Chennai", now(), 300.0);
    let forecast = engine
        .calibrate_at(&raw(&[120.0], 20.0), Some(&other), now())
        .unwrap();
    assert!(forecast.anchor_used.is_none());
    assert_eq!(forecast.days()[0].corrected_value, 120.0);
}

#[test]
fn test_invalid_anchor_value_is_ignored() {
    let engine = engine();
    for bad in [-5.0, f64::NAN, f64::INFINITY] {
        let forecast = engine
            .calibrate_at(&raw(&[120.0], 20.0), Some(&anchor(bad)), now())
            .unwrap();
        assert!(forecast.anchor_used.is_none());
    }
}

#[test]
fn test_zero_error_uses_w_min() {
    let engine = engine();
    assert_close(engine.blend_weight(0.0), DEFAULT_W_MIN);

    let forecast = engine
        .calibrate_at(&raw(&[100.0, 100.0], 0.0), Some(&anchor(200.0)), now())
        .unwrap();
    assert_close(forecast.days()[0].blend_weight, DEFAULT_W_MIN);
}

#[test]
fn test_blend_weight_is_monotonic_and_bounded() {
    for curve in [
        BlendCurve::Linear { error_ceiling: 60.0 },
        BlendCurve::Exponential { error_scale: 40.0 },
    ] {
        let engine = engine_with(|c| c.blend = curve);
        let mut previous = engine.blend_weight(0.0);
        for step in 1..500 {
            let w = engine.blend_weight(step as f64 * 0.5);
            assert!(w >= previous, "{:?} not monotonic at {}", curve, step);
            assert!((DEFAULT_W_MIN..=DEFAULT_W_MAX).contains(&w));
            previous = w;
        }
        assert_close(engine.blend_weight(f64::INFINITY), DEFAULT_W_MAX);
        assert!(engine.blend_weight(1e12) <= DEFAULT_W_MAX);
    }
}

#[test]
fn test_exponential_curve_approaches_w_max() {
    let engine = engine_with(|c| c.blend = BlendCurve::Exponential { error_scale: 10.0 });
    assert!(engine.blend_weight(1000.0) > DEFAULT_W_MAX - 1e-6);
    assert!(engine.blend_weight(10.0) < DEFAULT_W_MAX);
}

#[test]
fn test_unit_decay_carries_full_delta() {
    let engine = engine_with(|c| c.decay = 1.0);
    let forecast = engine
        .calibrate_at(
            &raw(&[100.0, 110.0, 90.0, 140.0], 20.0),
            Some(&anchor(160.0)),
            now(),
        )
        .unwrap();

    let delta = forecast.days()[0].correction();
    assert_close(delta, 24.0);
    for day in forecast.days() {
        assert_close(day.correction(), delta);
    }
}

#[test]
fn test_correction_never_grows_with_decay() {
    for decay in [0.1, 0.5, 0.9, 0.99] {
        let engine = engine_with(|c| {
            c.decay = decay;
            c.horizon_days = 7;
        });
        let values = [80.0, 95.0, 120.0, 60.0, 200.0, 150.0, 110.0];
        for anchor_value in [0.0, 40.0, 300.0] {
            let forecast = engine
                .calibrate_at(&raw(&values, 35.0), Some(&anchor(anchor_value)), now())
                .unwrap();
            for pair in forecast.days().windows(2) {
                assert!(pair[1].correction().abs() <= pair[0].correction().abs() + EPS);
            }
        }
    }
}

#[test]
fn test_corrected_values_are_never_negative() {
    let engine = engine_with(|c| {
        c.w_max = 1.0;
        c.decay = 1.0;
    });
    let forecast = engine
        .calibrate_at(&raw(&[0.0, 5.0, 500.0], 1e9), Some(&anchor(0.0)), now())
        .unwrap();
    assert!(forecast.days().iter().all(|d| d.corrected_value >= 0.0));

    // A strongly negative residual must still floor at zero on later days
    let forecast = engine
        .calibrate_at(&raw(&[400.0, 10.0, 0.0], 1e9), Some(&anchor(0.0)), now())
        .unwrap();
    assert_eq!(forecast.days()[1].corrected_value, 0.0);
    assert_eq!(forecast.days()[2].corrected_value, 0.0);
}

#[test]
fn test_day_offsets_are_contiguous() {
    let engine = engine();
    let forecast = engine
        .calibrate_at(&raw(&[1.0, 2.0, 3.0, 4.0, 5.0], 10.0), Some(&anchor(3.0)), now())
        .unwrap();
    assert_eq!(forecast.horizon_days(), 5);
    for (i, day) in forecast.days().iter().enumerate() {
        assert_eq!(day.day_offset, i);
    }
}

#[test]
fn test_later_day_blend_weight_reflects_decay() {
    let engine = engine();
    let forecast = engine
        .calibrate_at(&raw(&[100.0, 100.0, 100.0], 0.0), Some(&anchor(150.0)), now())
        .unwrap();
    let days = forecast.days();
    assert_close(days[1].blend_weight, DEFAULT_W_MIN * 0.5);
    assert_close(days[2].blend_weight, DEFAULT_W_MIN * 0.25);
}

#[test]
fn test_malformed_raw_forecast_is_rejected() {
    let engine = engine();

    let mut mismatched = raw(&[100.0, 110.0], 5.0);
    mismatched.horizon_days = 3;
    assert!(matches!(
        engine.calibrate_at(&mismatched, None, now()),
        Err(ForecastError::MalformedForecast { .. })
    ));

    let empty = raw(&[], 5.0);
    assert!(engine.calibrate_at(&empty, None, now()).is_err());

    let nan = raw(&[100.0, f64::NAN], 5.0);
    assert!(engine.calibrate_at(&nan, None, now()).is_err());

    let negative_error = raw(&[100.0], -1.0);
    assert!(engine.calibrate_at(&negative_error, None, now()).is_err());
}

#[test]
fn test_invalid_configuration_fails_fast() {
    let cases: Vec<Box<dyn Fn(&mut CalibrationConfig)>> = vec![
        Box::new(|c| c.w_min = -0.1),
        Box::new(|c| c.w_max = 1.5),
        Box::new(|c| {
            c.w_min = 0.9;
            c.w_max = 0.1
        }),
        Box::new(|c| c.decay = 0.0),
        Box::new(|c| c.decay = 1.01),
        Box::new(|c| c.decay = f64::NAN),
        Box::new(|c| c.horizon_days = 0),
        Box::new(|c| c.anchor_freshness = Duration::ZERO),
        Box::new(|c| c.blend = BlendCurve::Linear { error_ceiling: 0.0 }),
        Box::new(|c| c.blend = BlendCurve::Exponential { error_scale: -3.0 }),
        Box::new(|c| c.confidence_error_scale = 0.0),
    ];

    for (i, mutate) in cases.iter().enumerate() {
        let mut config = CalibrationConfig::default();
        mutate(&mut config);
        let result = CalibrationEngine::new(config);
        assert!(
            matches!(result, Err(ForecastError::InvalidConfiguration { .. })),
            "case {} should be rejected",
            i
        );
    }
}

#[test]
fn test_confidence_rises_with_anchor() {
    let engine = engine();
    let unanchored = engine
        .calibrate_at(&raw(&[120.0], 50.0), None, now())
        .unwrap();
    let anchored = engine
        .calibrate_at(&raw(&[120.0], 50.0), Some(&anchor(130.0)), now())
        .unwrap();

    assert_close(unanchored.confidence, 0.5);
    assert!(anchored.confidence > unanchored.confidence);
    assert!(anchored.confidence <= 1.0);
}

#[test]
fn test_low_confidence_reason() {
    let engine = engine();
    let poor = engine
        .calibrate_at(&raw(&[120.0], 500.0), None, now())
        .unwrap();
    assert!(poor.low_confidence_reason().is_some());

    let good = engine.calibrate_at(&raw(&[120.0], 1.0), None, now()).unwrap();
    assert!(good.low_confidence_reason().is_none());
}

#[test]
fn test_calibration_is_deterministic() {
    let engine = engine();
    let input = raw(&[120.0, 130.0, 140.0], 20.0);
    let a = engine.calibrate_at(&input, Some(&anchor(150.0)), now()).unwrap();
    let b = engine.calibrate_at(&input, Some(&anchor(150.0)), now()).unwrap();
    assert_eq!(a, b);
}
