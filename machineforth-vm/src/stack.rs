//! Stack primitives: `SDUP`/`SDROP`/`SNIP`/`RDUP`/`RDROP`, plus the generic
//! `FetchX`/`StoreX` memory-access primitives built on top of them.
//!
//! Translated from `original_source/Tiff/src/vm.c`'s `TRACEABLE` and
//! non-`TRACEABLE` variants of the same five functions, merged into one code
//! path parameterized by the `Tracer` trait: every mutation is traced in the
//! order the original's `TRACEABLE` branch performs it, with the trace call
//! compiling away to nothing under `NoTracer`.

use crate::regs::{RID_N, RID_R, RID_RP, RID_SP, RID_T};
use crate::trace::{Tracer, TRACE_NEW_SLOT, TRACE_SUBSEQUENT};
use crate::trace::UserFunction;
use crate::vm::Vm;

impl<const ROM: usize, const RAM: usize, const AXI: usize, U: UserFunction, TR: Tracer> Vm<ROM, RAM, AXI, U, TR> {
    /// Emit a trace record, compiled away entirely when `TR::ENABLED` is
    /// `false` (the `NoTracer` path).
    #[inline]
    pub(crate) fn trace_raw(&mut self, kind: u8, id: i32, old: u32, new: u32) {
        if TR::ENABLED {
            self.tracer.trace(kind, id, old, new);
        }
    }

    /// First trace of the current slot: kind is `TRACE_NEW_SLOT` if nothing
    /// has changed in this slot yet, `TRACE_SUBSEQUENT` otherwise. Clears
    /// the new-slot flag either way, so later calls in the same slot (even
    /// across nested primitives like `FetchX`'s internal `SDUP`) see it as
    /// already consumed.
    #[inline]
    pub(crate) fn trace_first(&mut self, id: i32, old: u32, new: u32) {
        let kind = if self.new_slot { TRACE_NEW_SLOT } else { TRACE_SUBSEQUENT };
        self.new_slot = false;
        self.trace_raw(kind, id, old, new);
    }

    /// A trace call that is never the first change of a slot (used for the
    /// second and third mutations a primitive performs).
    #[inline]
    pub(crate) fn trace_plain(&mut self, id: i32, old: u32, new: u32) {
        self.trace_raw(TRACE_SUBSEQUENT, id, old, new);
    }

    /// `SDUP`: push `N` onto the RAM-resident data-stack body, then `N = T`.
    /// `T` is left for the caller to overwrite.
    pub(crate) fn sdup(&mut self) {
        let new_sp = self.regs.sp.wrapping_sub(1);
        self.trace_first(RID_SP, self.regs.sp, new_sp);
        self.regs.sp = new_sp;

        let idx = (self.regs.sp as usize) & (RAM - 1);
        let old_cell = self.mem.ram_cell(idx);
        self.trace_plain(idx as i32, old_cell, self.regs.n);
        self.mem.set_ram_cell(idx, self.regs.n);

        self.trace_plain(RID_N, self.regs.n, self.regs.t);
        self.regs.n = self.regs.t;
    }

    /// `SDROP`: `T = N`, pop `N` back off the data-stack body.
    pub(crate) fn sdrop(&mut self) {
        self.trace_first(RID_T, self.regs.t, self.regs.n);
        self.regs.t = self.regs.n;

        let idx = (self.regs.sp as usize) & (RAM - 1);
        let ram_val = self.mem.ram_cell(idx);
        self.trace_plain(RID_N, self.regs.n, ram_val);
        self.regs.n = ram_val;

        let new_sp = self.regs.sp.wrapping_add(1);
        self.trace_plain(RID_SP, self.regs.sp, new_sp);
        self.regs.sp = new_sp;
    }

    /// `SNIP`: drop `T`'s former neighbour, pulling the next cell into `N`
    /// without touching `T`.
    pub(crate) fn snip(&mut self) {
        let idx = (self.regs.sp as usize) & (RAM - 1);
        let ram_val = self.mem.ram_cell(idx);
        self.trace_first(RID_N, self.regs.n, ram_val);
        self.regs.n = ram_val;

        let new_sp = self.regs.sp.wrapping_add(1);
        self.trace_plain(RID_SP, self.regs.sp, new_sp);
        self.regs.sp = new_sp;
    }

    /// `RDUP`: push `R` onto the RAM-resident return-stack body.
    pub(crate) fn rdup(&mut self) {
        let new_rp = self.regs.rp.wrapping_sub(1);
        self.trace_first(RID_RP, self.regs.rp, new_rp);
        self.regs.rp = new_rp;

        let idx = (self.regs.rp as usize) & (RAM - 1);
        let old_cell = self.mem.ram_cell(idx);
        self.trace_plain(idx as i32, old_cell, self.regs.r);
        self.mem.set_ram_cell(idx, self.regs.r);
    }

    /// `RDROP`: pop `R` back off the return-stack body.
    pub(crate) fn rdrop(&mut self) {
        let idx = (self.regs.rp as usize) & (RAM - 1);
        let ram_val = self.mem.ram_cell(idx);
        self.trace_first(RID_R, self.regs.r, ram_val);
        self.regs.r = ram_val;

        let new_rp = self.regs.rp.wrapping_add(1);
        self.trace_plain(RID_RP, self.regs.rp, new_rp);
        self.regs.rp = new_rp;
    }

    /// `FetchX(cell_addr, shift, mask)`: push the fetched value (`SDUP`),
    /// decode ROM/RAM/AXI, then land `(cell >> shift) & mask` in `T`.
    pub(crate) fn fetch_x(&mut self, cell_addr: u32, shift: u32, mask: u32) {
        self.sdup();
        let value = self.mem.fetch_decode(cell_addr, shift, mask);
        self.trace_plain(RID_T, self.regs.t, value);
        self.regs.t = value;
    }

    /// `StoreX(cell_addr, data, shift, mask)`: read-modify-write the target
    /// RAM cell (wrapped by `RAMsize-1`; ROM/AXI are never reached this
    /// way), then `SDROP`.
    pub(crate) fn store_x(&mut self, cell_addr: u32, data: u32, shift: u32, mask: u32) {
        let (idx, old, new) = self.mem.store_prepare(cell_addr, data, shift, mask);
        self.trace_first(idx as i32, old, new);
        self.mem.set_ram_cell(idx, new);
        self.sdrop();
    }
}
