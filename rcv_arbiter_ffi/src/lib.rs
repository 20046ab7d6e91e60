#![allow(clippy::missing_safety_doc)]

use std::ptr;

use rcv_arbiter_core::{
    Admission, ArbiterCfg, ArbiterError, ArbiterSnapshot, Phase, RecoveryArbiter, TickOutcome, Vec4,
};

/// FFI ABI version for rcv_arbiter_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const RCV_ARBITER_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn rcv_arbiter_ffi_version() -> u32 {
    RCV_ARBITER_FFI_VERSION
}

// Snapshot wire format identification.
const SNAP_MAGIC: u32 = 0x3156_4352; // "RCV1" little-endian
const SNAP_VERSION: u32 = 1;
const SNAP_HEADER_LEN: usize = 12;

// Return codes shared by every fallible entry point.
pub const RCV_OK: i32 = 0;
pub const RCV_ERR_NULL: i32 = -1;
pub const RCV_ERR_DIMENSION: i32 = -2;
pub const RCV_ERR_NON_FINITE: i32 = -3;
pub const RCV_ERR_CONFIG: i32 = -4;
pub const RCV_ERR_CORRUPT: i32 = -5;
pub const RCV_ERR_TRUNCATED: i32 = -6;
pub const RCV_ERR_BAD_MAGIC: i32 = -8;
pub const RCV_ERR_VERSION: i32 = -9;

fn rc_of(e: &ArbiterError) -> i32 {
    match e {
        ArbiterError::InvalidDimension { .. } => RCV_ERR_DIMENSION,
        ArbiterError::NonFinite { .. } => RCV_ERR_NON_FINITE,
        ArbiterError::Config(_) => RCV_ERR_CONFIG,
        ArbiterError::CorruptSnapshot { .. } => RCV_ERR_CORRUPT,
    }
}

/// Opaque handle exposed over FFI. One handle tracks one subject.
#[repr(C)]
pub struct RcvArbiter {
    inner: RecoveryArbiter,
}

/// Four-axis vector passed by value.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RcvVec4 {
    pub v: [f64; 4],
}

impl From<Vec4> for RcvVec4 {
    fn from(v: Vec4) -> Self {
        RcvVec4 { v }
    }
}

/// Arbiter cfg for FFI.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RcvCfg {
    pub tau: f64,
    pub g0: f64,
    pub alpha: f64,
    pub k_max: u32,
    pub theta_cancel: f64,
    pub rho: f64,
    pub kappa: f64,
    pub theta_slow: f64,
    pub fast_quantile: f64,
}

#[no_mangle]
pub extern "C" fn rcv_arbiter_cfg_default() -> RcvCfg {
    let d = ArbiterCfg::default();
    RcvCfg {
        tau: d.tau,
        g0: d.g0,
        alpha: d.alpha,
        k_max: d.k_max,
        theta_cancel: d.theta_cancel,
        rho: d.rho,
        kappa: d.kappa,
        theta_slow: d.theta_slow,
        fast_quantile: d.fast_quantile,
    }
}

fn cfg_from_ffi(c: RcvCfg) -> ArbiterCfg {
    ArbiterCfg {
        tau: c.tau,
        g0: c.g0,
        alpha: c.alpha,
        k_max: c.k_max,
        theta_cancel: c.theta_cancel,
        rho: c.rho,
        kappa: c.kappa,
        theta_slow: c.theta_slow,
        fast_quantile: c.fast_quantile,
    }
}

/// Phase as a C-friendly enum.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcvPhase {
    Idle = 0,
    Pending = 1,
    Confirmed = 2,
    Cancelled = 3,
    HijackSuspected = 4,
}

fn phase_to_ffi(p: Phase) -> RcvPhase {
    match p {
        Phase::Idle => RcvPhase::Idle,
        Phase::Pending => RcvPhase::Pending,
        Phase::Confirmed => RcvPhase::Confirmed,
        Phase::Cancelled => RcvPhase::Cancelled,
        Phase::HijackSuspected => RcvPhase::HijackSuspected,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcvAdmissionKind {
    Pending = 0,
    Rejected = 1,
    AlreadyPending = 2,
    AwaitingReset = 3,
    /// Input error; see `rc`.
    Error = 4,
}

/// Admission result. Diagnostic fields are zero unless the kind populates them.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RcvAdmission {
    pub kind: RcvAdmissionKind,
    /// `k_max` for Pending, turns remaining for AlreadyPending.
    pub turns: u32,
    pub evidence: f64,
    pub trust_threshold: f64,
    pub consistency: f64,
    /// Phase after the call.
    pub phase: RcvPhase,
    pub rc: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcvTickKind {
    NoOp = 0,
    Monitoring = 1,
    Confirmed = 2,
    Cancelled = 3,
    HijackSuspected = 4,
    Error = 5,
}

/// Tick result.
/// `integrals` is what the caller should hold after this tick: the reduced
/// vector on confirmation, otherwise exactly what was passed in.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RcvTick {
    pub kind: RcvTickKind,
    pub phase: RcvPhase,
    pub turns_left: u32,
    pub decay_factor: f64,
    pub integrals: RcvVec4,
    pub rc: i32,
}

/// Owned byte buffer (for snapshot).
#[repr(C)]
pub struct RcvBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

/// Create a new arbiter handle. Returns null if `cfg` is invalid.
///
/// Handles are not internally synchronized: a subject's calls must be serialized by the caller.
#[no_mangle]
pub extern "C" fn rcv_arbiter_new(cfg: RcvCfg) -> *mut RcvArbiter {
    match RecoveryArbiter::new(cfg_from_ffi(cfg)) {
        Ok(inner) => Box::into_raw(Box::new(RcvArbiter { inner })),
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_free(h: *mut RcvArbiter) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Fold one observation into the anomaly score. The new score is written to `out_score`.
#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_update_anomaly(
    h: *mut RcvArbiter,
    observed_ptr: *const f64,
    observed_len: usize,
    predicted_ptr: *const f64,
    predicted_len: usize,
    out_score: *mut f64,
) -> i32 {
    if h.is_null() || observed_ptr.is_null() || predicted_ptr.is_null() {
        return RCV_ERR_NULL;
    }
    let handle = &mut *h;
    let observed = std::slice::from_raw_parts(observed_ptr, observed_len);
    let predicted = std::slice::from_raw_parts(predicted_ptr, predicted_len);

    match handle.inner.update_anomaly(observed, predicted) {
        Ok(score) => {
            if !out_score.is_null() {
                *out_score = score;
            }
            RCV_OK
        }
        Err(e) => rc_of(&e),
    }
}

/// Current dynamic trust threshold; NaN for a null handle.
#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_dynamic_threshold(h: *const RcvArbiter) -> f64 {
    if h.is_null() {
        return f64::NAN;
    }
    (*h).inner.dynamic_threshold()
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_attempt_recovery(
    h: *mut RcvArbiter,
    snapshot: RcvVec4,
    evidence: f64,
    consistency: f64,
) -> RcvAdmission {
    let mut out = RcvAdmission {
        kind: RcvAdmissionKind::Error,
        turns: 0,
        evidence: 0.0,
        trust_threshold: 0.0,
        consistency: 0.0,
        phase: RcvPhase::Idle,
        rc: RCV_ERR_NULL,
    };
    if h.is_null() {
        return out;
    }
    let handle = &mut *h;

    match handle.inner.attempt_recovery(snapshot.v, evidence, consistency) {
        Ok(Admission::Pending { k_max }) => {
            out.kind = RcvAdmissionKind::Pending;
            out.turns = k_max;
        }
        Ok(Admission::Rejected { evidence, trust_threshold, consistency }) => {
            out.kind = RcvAdmissionKind::Rejected;
            out.evidence = evidence;
            out.trust_threshold = trust_threshold;
            out.consistency = consistency;
        }
        Ok(Admission::AlreadyPending { turns_remaining }) => {
            out.kind = RcvAdmissionKind::AlreadyPending;
            out.turns = turns_remaining;
        }
        Ok(Admission::AwaitingReset { .. }) => {
            out.kind = RcvAdmissionKind::AwaitingReset;
        }
        Err(e) => {
            out.rc = rc_of(&e);
            out.phase = phase_to_ffi(handle.inner.phase());
            return out;
        }
    }
    out.rc = RCV_OK;
    out.phase = phase_to_ffi(handle.inner.phase());
    out
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_tick(h: *mut RcvArbiter, current: RcvVec4, rate: f64) -> RcvTick {
    let mut out = RcvTick {
        kind: RcvTickKind::Error,
        phase: RcvPhase::Idle,
        turns_left: 0,
        decay_factor: 0.0,
        integrals: current,
        rc: RCV_ERR_NULL,
    };
    if h.is_null() {
        return out;
    }
    let handle = &mut *h;

    match handle.inner.tick(current.v, rate) {
        Ok(outcome) => {
            out.integrals = outcome.resulting_integrals(current.v).into();
            out.kind = match outcome {
                TickOutcome::NoOp { .. } => RcvTickKind::NoOp,
                TickOutcome::Monitoring { turns_left, decay_factor, .. } => {
                    out.turns_left = turns_left;
                    out.decay_factor = decay_factor;
                    RcvTickKind::Monitoring
                }
                TickOutcome::Confirmed { .. } => RcvTickKind::Confirmed,
                TickOutcome::Cancelled { .. } => RcvTickKind::Cancelled,
                TickOutcome::HijackSuspected { .. } => RcvTickKind::HijackSuspected,
            };
            out.rc = RCV_OK;
        }
        Err(e) => out.rc = rc_of(&e),
    }
    out.phase = phase_to_ffi(handle.inner.phase());
    out
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_reset(h: *mut RcvArbiter) {
    if !h.is_null() {
        (*h).inner.reset();
    }
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_phase(h: *const RcvArbiter) -> RcvPhase {
    if h.is_null() {
        return RcvPhase::Idle;
    }
    phase_to_ffi((*h).inner.phase())
}

/// Number of audit records accumulated so far.
#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_history_len(h: *const RcvArbiter) -> usize {
    if h.is_null() {
        return 0;
    }
    (*h).inner.history().len()
}

/// Snapshot format (binary):
/// [u32 magic = "RCV1"][u32 version = 1][u32 payload_len][payload: JSON `ArbiterSnapshot`]
///
/// Returns an empty buffer on failure.
#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_snapshot(h: *const RcvArbiter) -> RcvBytes {
    let empty = RcvBytes { ptr: ptr::null_mut(), len: 0 };
    if h.is_null() {
        return empty;
    }
    let payload = match (*h).inner.snapshot().to_json() {
        Ok(p) => p,
        Err(_) => return empty,
    };
    let payload_len = match u32::try_from(payload.len()) {
        Ok(n) => n,
        Err(_) => return empty,
    };

    let mut buf: Vec<u8> = Vec::with_capacity(SNAP_HEADER_LEN + payload.len());
    buf.extend_from_slice(&SNAP_MAGIC.to_le_bytes());
    buf.extend_from_slice(&SNAP_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&payload);

    let mut boxed = buf.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    let len = boxed.len();
    std::mem::forget(boxed);

    RcvBytes { ptr, len }
}

#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_bytes_free(b: RcvBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

fn decode_snapshot(data: &[u8]) -> Result<RecoveryArbiter, i32> {
    let read_u32 = |i: usize| -> Option<u32> {
        let b = data.get(i..i.checked_add(4)?)?;
        Some(u32::from_le_bytes(b.try_into().ok()?))
    };

    let magic = read_u32(0).ok_or(RCV_ERR_TRUNCATED)?;
    if magic != SNAP_MAGIC {
        return Err(RCV_ERR_BAD_MAGIC);
    }
    let ver = read_u32(4).ok_or(RCV_ERR_TRUNCATED)?;
    if ver != SNAP_VERSION {
        return Err(RCV_ERR_VERSION);
    }
    let payload_len = usize::try_from(read_u32(8).ok_or(RCV_ERR_TRUNCATED)?).map_err(|_| RCV_ERR_TRUNCATED)?;
    let end = SNAP_HEADER_LEN.checked_add(payload_len).ok_or(RCV_ERR_TRUNCATED)?;
    let payload = data.get(SNAP_HEADER_LEN..end).ok_or(RCV_ERR_TRUNCATED)?;

    let snap = ArbiterSnapshot::from_json(payload).map_err(|e| rc_of(&e))?;
    RecoveryArbiter::restore(snap).map_err(|e| rc_of(&e))
}

/// Replace the handle's state with a snapshot. On any error the handle is left untouched.
#[no_mangle]
pub unsafe extern "C" fn rcv_arbiter_restore(h: *mut RcvArbiter, bytes: *const u8, len: usize) -> i32 {
    if h.is_null() || bytes.is_null() || len < SNAP_HEADER_LEN {
        return RCV_ERR_NULL;
    }
    let handle = &mut *h;
    let data = std::slice::from_raw_parts(bytes, len);

    match decode_snapshot(data) {
        Ok(restored) => {
            handle.inner = restored;
            RCV_OK
        }
        Err(rc) => rc,
    }
}
