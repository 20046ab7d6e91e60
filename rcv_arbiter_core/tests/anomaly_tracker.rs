use rcv_arbiter_core::*;

fn tracker() -> AnomalyTracker {
    AnomalyTracker::new(&ArbiterCfg { tau: 0.2, g0: 0.4, alpha: 1.0, ..ArbiterCfg::default() }).unwrap()
}

#[test]
fn sustained_deviation_then_forgetting() {
    let mut t = tracker();
    for _ in 0..5 {
        t.update(&[0.1, 0.1, 0.1, 0.1], &[0.8, 0.8, 0.8, 0.8]).unwrap();
    }
    let expected = 1.4 * (1.0 - 0.8_f64.powi(5));
    assert!((t.score() - expected).abs() < 1e-9, "a_anom {}", t.score());
    assert!((t.score() - 0.94125).abs() < 1e-4);

    let g_min = t.dynamic_threshold();
    let expected_g = 0.4 + 0.6 * expected / (expected + 1.0);
    assert!((g_min - expected_g).abs() < 1e-12);
    assert!((g_min - 0.6909).abs() < 1e-3, "g_min {g_min}");

    // Honest turns: no deviation, the score drains back toward zero.
    for _ in 0..25 {
        t.update(&[0.5; 4], &[0.5; 4]).unwrap();
    }
    assert!((t.score() - expected * 0.8_f64.powi(25)).abs() < 1e-9);
    assert!(t.dynamic_threshold() - 0.4 < 0.01);
}

#[test]
fn threshold_starts_at_baseline() {
    assert_eq!(tracker().dynamic_threshold(), 0.4);
}

#[test]
fn dual_route_classification() {
    let t = tracker();
    let th = t.thresholds();
    assert_eq!(th.theta_slow, 2.0);
    assert!((th.theta_fast - 4.2973).abs() < 1e-2, "theta_fast {}", th.theta_fast);

    assert_eq!(t.classify(1.0), AnomalyRoute::Normal);
    assert_eq!(t.classify(2.0), AnomalyRoute::Normal);
    assert_eq!(t.classify(3.0), AnomalyRoute::SlowPathAnomaly);
    assert_eq!(t.classify(10.0), AnomalyRoute::FastPathAnomaly);
    assert_eq!(t.classify(f64::NAN), AnomalyRoute::FastPathAnomaly);

    assert_eq!(t.classify_residual(&[1.5, 1.5, 1.5, 1.5]).unwrap(), AnomalyRoute::SlowPathAnomaly);
    assert!(t.classify_residual(&[1.0, 1.0]).is_err());
}

#[test]
fn non_finite_observation_is_refused() {
    let mut t = tracker();
    let err = t.update(&[f64::NAN, 0.0, 0.0, 0.0], &[0.0; 4]).unwrap_err();
    assert!(matches!(err, ArbiterError::NonFinite { .. }));
    assert_eq!(t.score(), 0.0);
}

#[test]
fn huge_finite_deviation_keeps_threshold_bounded() {
    let mut arb = RecoveryArbiter::new(ArbiterCfg::default()).unwrap();
    let score = arb.update_anomaly(&[1e155, 0.0, 0.0, 0.0], &[0.0; 4]).unwrap();
    assert!(score.is_finite());
    assert!((score - 0.2e155).abs() <= 1e141);

    let g = arb.dynamic_threshold();
    assert!((0.4..1.0).contains(&g), "g_min {g}");

    // Honest turns still drain it.
    for _ in 0..50 {
        arb.update_anomaly(&[0.0; 4], &[0.0; 4]).unwrap();
    }
    assert!(arb.anomaly_score() < score);

    match arb.attempt_recovery([1.0; 4], 0.999, 0.99).unwrap() {
        Admission::Rejected { trust_threshold, .. } => assert!(trust_threshold < 1.0),
        other => panic!("expected rejection, got {other:?}"),
    }

    arb.clear_anomaly();
    let adm = arb.attempt_recovery([1.0; 4], 0.999, 0.99).unwrap();
    assert_eq!(adm, Admission::Pending { k_max: 5 });

    let bytes = arb.snapshot().to_json().unwrap();
    let restored = RecoveryArbiter::restore(ArbiterSnapshot::from_json(&bytes).unwrap()).unwrap();
    assert_eq!(restored.phase(), Phase::Pending);
}

#[test]
fn overflowing_distance_is_refused_and_score_kept() {
    let mut arb = RecoveryArbiter::new(ArbiterCfg::default()).unwrap();
    arb.update_anomaly(&[1.0; 4], &[0.0; 4]).unwrap();
    let before = arb.anomaly_score();

    let err = arb.update_anomaly(&[f64::MAX, 0.0, 0.0, 0.0], &[-f64::MAX, 0.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, ArbiterError::NonFinite { .. }));
    assert_eq!(arb.anomaly_score(), before);
    assert!(arb.dynamic_threshold() < 1.0);

    let bytes = arb.snapshot().to_json().unwrap();
    assert!(ArbiterSnapshot::from_json(&bytes).is_ok());
}

#[test]
fn clear_score_is_explicit() {
    let mut t = tracker();
    t.update(&[1.0; 4], &[0.0; 4]).unwrap();
    assert!(t.score() > 0.0);
    t.clear_score();
    assert_eq!(t.score(), 0.0);
    assert_eq!(t.dynamic_threshold(), 0.4);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let bad = [
        ArbiterCfg { alpha: 0.0, ..ArbiterCfg::default() },
        ArbiterCfg { tau: 1.0, ..ArbiterCfg::default() },
        ArbiterCfg { g0: 1.0, ..ArbiterCfg::default() },
        ArbiterCfg { k_max: 0, ..ArbiterCfg::default() },
        ArbiterCfg { theta_cancel: 0.0, ..ArbiterCfg::default() },
        ArbiterCfg { rho: 1.5, ..ArbiterCfg::default() },
        ArbiterCfg { kappa: -0.1, ..ArbiterCfg::default() },
    ];
    for cfg in bad {
        assert!(
            matches!(RecoveryArbiter::new(cfg.clone()), Err(ArbiterError::Config(_))),
            "accepted {cfg:?}"
        );
    }
}
