//! Tracing and user-opcode hooks.
//!
//! Both are host collaborators the VM invokes but never implements itself
//! (see `original_source/Tiff/src/vm.c`'s `Trace`/`UserFunction` externs).
//! Rather than gate a second code path behind a compile-time `TRACEABLE`
//! switch, the way the original C source does, both hooks are trait-bounded
//! type parameters on `Vm` with zero-cost no-op defaults — the same shape
//! `kernel-vm`'s `AddressSpace<Meta, M: PageManager<Meta>>` uses for its page
//! manager.

/// Trace event kind. Kept as named constants rather than an enum so the
/// numeric contract a non-Rust host might depend on stays exactly the
/// documented integers (0/1/3 — type 2 is reserved by the original and never
/// emitted).
pub const TRACE_SUBSEQUENT: u8 = 0;
pub const TRACE_NEW_SLOT: u8 = 1;
pub const TRACE_NEW_GROUP: u8 = 3;

/// Host-supplied observer for every register/memory mutation the VM performs.
///
/// `trace` is called with the old and new value *before* the mutation lands,
/// in the exact order the mutating primitive performs them, so that replaying
/// `UnTrace` in reverse restores prior state exactly (§4.6, §8).
pub trait Tracer {
    fn trace(&mut self, kind: u8, id: i32, old: u32, new: u32);

    /// Gate for the opcode-profile counters and cycle counter, which only
    /// exist in the original's `TRACEABLE` build. `NoTracer` sets this to
    /// `false` so `Vm::step` skips that bookkeeping entirely.
    const ENABLED: bool = true;
}

/// No-op tracer for hosts that don't need undo/profiling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTracer;

impl Tracer for NoTracer {
    #[inline(always)]
    fn trace(&mut self, _kind: u8, _id: i32, _old: u32, _new: u32) {}

    const ENABLED: bool = false;
}

/// Host implementation of opcode 060 (`USER`).
pub trait UserFunction {
    fn call(&mut self, t: u32, n: u32, imm: u32) -> u32;
}

/// Default `USER` hook for a host that never encodes opcode 060: returns 0,
/// matching a call through an unpopulated function pointer clearing `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUserFunction;

impl UserFunction for NoUserFunction {
    fn call(&mut self, _t: u32, _n: u32, _imm: u32) -> u32 {
        0
    }
}
