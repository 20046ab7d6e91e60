//! FFI smoke tests.
//!
//! These tests call the exported `extern "C"` functions directly (as an external consumer would),
//! to validate:
//! - ABI surface compiles and links
//! - a full admission/confirmation cycle through the handle
//! - allocation/free symmetry for returned buffers
//! - snapshot/restore round-trip works

use std::ptr;

use rcv_arbiter_ffi::*;

fn v4(v: [f64; 4]) -> RcvVec4 {
    RcvVec4 { v }
}

const BASELINE: [f64; 4] = [180.0, 260.0, 310.0, 190.0];

#[test]
fn ffi_version_and_default_cfg() {
    assert_eq!(rcv_arbiter_ffi_version(), RCV_ARBITER_FFI_VERSION);

    let cfg = rcv_arbiter_cfg_default();
    assert_eq!(cfg.k_max, 5);
    assert!(cfg.tau > 0.0 && cfg.tau < 1.0);
    assert!(cfg.alpha > 0.0);
}

#[test]
fn ffi_invalid_cfg_gives_null() {
    let mut cfg = rcv_arbiter_cfg_default();
    cfg.alpha = 0.0;
    assert!(rcv_arbiter_new(cfg).is_null());
}

#[test]
fn ffi_update_anomaly_checks_dimension() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());
    assert!(!h.is_null());

    let obs = [0.1_f64; 4];
    let pred = [0.8_f64; 4];
    let mut score = 0.0_f64;
    let rc = unsafe { rcv_arbiter_update_anomaly(h, obs.as_ptr(), 4, pred.as_ptr(), 4, &mut score) };
    assert_eq!(rc, RCV_OK);
    assert!((score - 0.28).abs() < 1e-9);

    let rc = unsafe { rcv_arbiter_update_anomaly(h, obs.as_ptr(), 3, pred.as_ptr(), 4, &mut score) };
    assert_eq!(rc, RCV_ERR_DIMENSION);

    let g = unsafe { rcv_arbiter_dynamic_threshold(h) };
    assert!(g > 0.4 && g < 1.0);

    unsafe { rcv_arbiter_free(h) };
}

#[test]
fn ffi_confirm_cycle() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());

    let adm = unsafe { rcv_arbiter_attempt_recovery(h, v4(BASELINE), 0.85, 0.9) };
    assert_eq!(adm.rc, RCV_OK);
    assert_eq!(adm.kind, RcvAdmissionKind::Pending);
    assert_eq!(adm.turns, 5);
    assert_eq!(adm.phase, RcvPhase::Pending);

    let again = unsafe { rcv_arbiter_attempt_recovery(h, v4(BASELINE), 0.99, 1.0) };
    assert_eq!(again.kind, RcvAdmissionKind::AlreadyPending);

    let mut held = v4(BASELINE);
    for rate in [0.02, -0.01, 0.01, -0.02] {
        let t = unsafe { rcv_arbiter_tick(h, held, rate) };
        assert_eq!(t.rc, RCV_OK);
        assert_eq!(t.kind, RcvTickKind::Monitoring);
        held = t.integrals;
    }
    assert_eq!(held, v4(BASELINE));

    let t = unsafe { rcv_arbiter_tick(h, held, 0.0) };
    assert_eq!(t.kind, RcvTickKind::Confirmed);
    assert_eq!(t.phase, RcvPhase::Confirmed);
    for (got, want) in t.integrals.v.iter().zip([126.0, 182.0, 217.0, 133.0]) {
        assert!((got - want).abs() < 1e-9);
    }

    // admitted + 5 ticks + confirmed
    assert_eq!(unsafe { rcv_arbiter_history_len(h) }, 7);

    unsafe { rcv_arbiter_reset(h) };
    assert_eq!(unsafe { rcv_arbiter_phase(h) }, RcvPhase::Idle);

    unsafe { rcv_arbiter_free(h) };
}

#[test]
fn ffi_non_finite_rate_is_reported() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());
    unsafe { rcv_arbiter_attempt_recovery(h, v4(BASELINE), 0.85, 0.9) };
    let t = unsafe { rcv_arbiter_tick(h, v4(BASELINE), f64::NAN) };
    assert_eq!(t.kind, RcvTickKind::Error);
    assert_eq!(t.rc, RCV_ERR_NON_FINITE);
    assert_eq!(t.phase, RcvPhase::Pending);
    unsafe { rcv_arbiter_free(h) };
}

#[test]
fn ffi_infinite_consistency_is_reported() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());
    let adm = unsafe { rcv_arbiter_attempt_recovery(h, v4(BASELINE), 0.9, f64::INFINITY) };
    assert_eq!(adm.kind, RcvAdmissionKind::Error);
    assert_eq!(adm.rc, RCV_ERR_NON_FINITE);
    assert_eq!(unsafe { rcv_arbiter_phase(h) }, RcvPhase::Idle);
    unsafe { rcv_arbiter_free(h) };
}

#[test]
fn ffi_snapshot_restore_roundtrip() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());
    assert!(!h.is_null());

    // Open a window and consume two turns so there is pending state to carry.
    unsafe { rcv_arbiter_attempt_recovery(h, v4(BASELINE), 0.85, 0.9) };
    unsafe { rcv_arbiter_tick(h, v4(BASELINE), 0.0) };
    unsafe { rcv_arbiter_tick(h, v4(BASELINE), 0.0) };

    let snap = unsafe { rcv_arbiter_snapshot(h) };
    assert!(!snap.ptr.is_null());
    assert!(snap.len > 12); // magic + version + len + payload

    // Restore into a fresh handle and finish the window there.
    let h2 = rcv_arbiter_new(rcv_arbiter_cfg_default());
    let rc = unsafe { rcv_arbiter_restore(h2, snap.ptr as *const u8, snap.len) };
    assert_eq!(rc, RCV_OK);
    assert_eq!(unsafe { rcv_arbiter_phase(h2) }, RcvPhase::Pending);
    assert_eq!(unsafe { rcv_arbiter_history_len(h2) }, 3);

    let mut last = RcvTickKind::Error;
    for _ in 0..3 {
        last = unsafe { rcv_arbiter_tick(h2, v4(BASELINE), 0.0) }.kind;
    }
    assert_eq!(last, RcvTickKind::Confirmed);

    unsafe { rcv_arbiter_bytes_free(snap) };
    unsafe { rcv_arbiter_free(h) };
    unsafe { rcv_arbiter_free(h2) };
}

#[test]
fn ffi_restore_rejects_bad_header() {
    let h = rcv_arbiter_new(rcv_arbiter_cfg_default());

    let junk = [0u8; 16];
    let rc = unsafe { rcv_arbiter_restore(h, junk.as_ptr(), junk.len()) };
    assert_eq!(rc, RCV_ERR_BAD_MAGIC);

    let rc = unsafe { rcv_arbiter_restore(h, ptr::null(), 0) };
    assert_eq!(rc, RCV_ERR_NULL);

    // Valid header, truncated payload.
    let snap = unsafe { rcv_arbiter_snapshot(h) };
    let data = unsafe { std::slice::from_raw_parts(snap.ptr, snap.len) };
    let rc = unsafe { rcv_arbiter_restore(h, data.as_ptr(), data.len() - 1) };
    assert_eq!(rc, RCV_ERR_TRUNCATED);
    assert_eq!(unsafe { rcv_arbiter_phase(h) }, RcvPhase::Idle);

    // Header claiming the largest possible payload.
    let mut huge = data[..12].to_vec();
    huge[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
    let rc = unsafe { rcv_arbiter_restore(h, huge.as_ptr(), huge.len()) };
    assert_eq!(rc, RCV_ERR_TRUNCATED);

    unsafe { rcv_arbiter_bytes_free(snap) };
    unsafe { rcv_arbiter_free(h) };
}
