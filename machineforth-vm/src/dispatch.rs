//! Instruction dispatcher: the slot loop and the 64-entry opcode table.
//!
//! Translated from `original_source/Tiff/src/vm.c`'s `VMstep`. The slot
//! variable drives three exit modes on top of the default "advance by 6":
//! short-circuit to the tail slot (`slot = 0`), restart (`slot = 26`, which
//! the unconditional post-decrement turns into "resume at 20" — see
//! `DESIGN.md`), and the hard early returns that PC-writing/pointer-fetch/
//! user-call opcodes take. The tail re-entry at `slot == -4` is kept as an
//! explicit final step rather than an implicit fall-through, per §9's
//! design note.

use crate::regs::{RID_A, RID_B, RID_N, RID_PC, RID_R, RID_RP, RID_SP, RID_T, RID_UP};
use crate::trace::{Tracer, UserFunction, TRACE_NEW_GROUP};
use crate::vm::Vm;

impl<const ROM: usize, const RAM: usize, const AXI: usize, U: UserFunction, TR: Tracer> Vm<ROM, RAM, AXI, U, TR> {
    /// Execute one instruction group. Returns the post-increment PC.
    pub fn step(&mut self, ir: u32, paused: bool) -> u32 {
        if !paused {
            let new_pc = self.regs.pc.wrapping_add(1);
            self.trace_raw(TRACE_NEW_GROUP, RID_PC, self.regs.pc, new_pc);
            self.regs.pc = new_pc;
        }

        let mut slot: i32 = 26;
        while slot >= 0 {
            let shift = slot as u32;
            let opcode = ((ir >> shift) & 0x3F) as usize;
            let imm = ir & ((1u32 << shift) - 1);
            self.count_slot(opcode, paused);
            if let Some(pc) = self.exec_opcode(opcode, imm, paused, &mut slot) {
                return pc;
            }
            slot -= 6;
        }

        if slot == -4 {
            // The 2-bit tail: only NOP/DUP/`;`/`+` (opcodes 0..3) are
            // reachable here, and none of them consume an immediate.
            let opcode = (ir & 3) as usize;
            self.count_slot(opcode, paused);
            if let Some(pc) = self.exec_opcode(opcode, 0, paused, &mut slot) {
                return pc;
            }
        }

        self.regs.pc
    }

    /// Per-slot bookkeeping done before dispatch: mark the slot as fresh for
    /// trace purposes, bump the saturating opcode-profile counter, and
    /// advance the cycle count. Counter/cycle tracking is compiled out
    /// entirely when `TR::ENABLED` is `false`.
    #[inline]
    fn count_slot(&mut self, opcode: usize, paused: bool) {
        self.new_slot = true;
        if TR::ENABLED {
            self.op_counters[opcode] = self.op_counters[opcode].saturating_add(1);
            if !paused {
                self.cycle += 1;
            }
        }
    }

    /// Write `PC`, tracing the change and adding the 3-cycle pipeline-flush
    /// cost for any slot that mutates it (§4.4, §8).
    #[inline]
    fn pc_write(&mut self, new_pc: u32, paused: bool) {
        self.trace_first(RID_PC, self.regs.pc, new_pc);
        self.regs.pc = new_pc;
        if TR::ENABLED && !paused {
            self.cycle += 3;
        }
    }

    /// Dispatch a single opcode. Returns `Some(pc)` when the slot must end
    /// the step immediately (PC write, call, jump, user function, or
    /// pointer-fetch); otherwise returns `None` and the caller advances to
    /// the next slot. `slot` is `26`/`20`/`14`/`8`/`2` for a real slot, or
    /// (for bookkeeping only) whatever it was after the last slot for the
    /// 2-bit tail.
    fn exec_opcode(&mut self, opcode: usize, imm: u32, paused: bool, slot: &mut i32) -> Option<u32> {
        match opcode {
            0o00 => {} // NOP

            0o01 => self.sdup(), // DUP

            0o02 => {
                // `;`: return from a called word. Ends the group (the table
                // calls this "end group", not "return") — the remaining
                // slots, including the 2-bit tail, are skipped because the
                // slot-loop's unconditional post-decrement turns `slot = 0`
                // into -6, not -4.
                let new_pc = self.regs.r >> 2;
                self.pc_write(new_pc, paused);
                self.rdrop();
                *slot = 0;
            }

            0o03 => {
                // `+`
                let sum = self.regs.t.wrapping_add(self.regs.n);
                self.trace_first(RID_T, self.regs.t, sum);
                self.regs.t = sum;
                self.snip();
            }

            0o04 => *slot = 0, // NO:

            0o05 => {
                // R@
                self.sdup();
                self.trace_plain(RID_T, self.regs.t, self.regs.r);
                self.regs.t = self.regs.r;
            }

            0o06 => {
                // `;|`: the table marks this one "return", unlike `;`'s
                // "end group" — implemented as a hard return so a `;|`
                // always terminates the step immediately, regardless of
                // which slot it occupies.
                let new_pc = self.regs.r >> 2;
                self.pc_write(new_pc, paused);
                self.rdrop();
                return Some(self.regs.pc);
            }

            0o07 => {
                // AND
                let v = self.regs.t & self.regs.n;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
                self.snip();
            }

            0o10 => {
                // NIF:
                if self.regs.t != 0 {
                    *slot = 0;
                }
            }

            0o11 => {
                // OVER
                let m = self.regs.n;
                self.sdup();
                self.trace_plain(RID_T, self.regs.t, m);
                self.regs.t = m;
            }

            0o12 => {
                // R>
                self.sdup();
                self.trace_plain(RID_T, self.regs.t, self.regs.r);
                self.regs.t = self.regs.r;
                self.rdrop();
            }

            0o13 => {
                // XOR
                let v = self.regs.t ^ self.regs.n;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
                self.snip();
            }

            0o14 => {
                // IF|
                if self.regs.t == 0 {
                    *slot = 0;
                }
            }

            0o15 => {
                // A
                self.sdup();
                self.trace_plain(RID_T, self.regs.t, self.regs.a);
                self.regs.t = self.regs.a;
            }

            0o16 => self.rdrop(), // RDROP

            0o20 => {
                // +IF:
                if self.regs.t & 0x8000_0000 != 0 {
                    *slot = 0;
                }
            }

            0o21 => {
                // !AS: SendAXI(T/4, N&0xFF); A,T += 4*((N&0xFF)+1)
                let len = self.regs.n & 0xFF;
                self.mem.send_axi(self.regs.a, self.regs.t / 4, len);
                let delta = 4 * (len + 1);
                let new_a = self.regs.a.wrapping_add(delta);
                self.trace_first(RID_A, self.regs.a, new_a);
                self.regs.a = new_a;
                let new_t = self.regs.t.wrapping_add(delta);
                self.trace_plain(RID_T, self.regs.t, new_t);
                self.regs.t = new_t;
            }

            0o22 => self.fetch_x(self.regs.a >> 2, 0, 0xFFFF_FFFF), // @A

            0o24 => {
                // -IF:
                if self.regs.t & 0x8000_0000 == 0 {
                    *slot = 0;
                }
            }

            0o25 => {
                // 2*
                let v = self.regs.t << 1;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
            }

            0o26 => {
                // @A+
                self.fetch_x(self.regs.a >> 2, 0, 0xFFFF_FFFF);
                let new_a = self.regs.a.wrapping_add(4);
                self.trace_plain(RID_A, self.regs.a, new_a);
                self.regs.a = new_a;
            }

            0o30 => {
                // NEXT: loop unless R's bit 16 is set.
                if self.regs.r & 0x1_0000 != 0 {
                    *slot = 0;
                }
                let new_r = self.regs.r.wrapping_sub(1);
                self.trace_first(RID_R, self.regs.r, new_r);
                self.regs.r = new_r;
            }

            0o31 => {
                // U2/ (logical shift)
                let v = self.regs.t >> 1;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
            }

            0o32 => {
                // W@A
                let shift = (self.regs.a & 2) * 8;
                self.fetch_x(self.regs.a >> 2, shift, 0xFFFF);
            }

            0o33 => {
                // A!
                self.trace_first(RID_A, self.regs.a, self.regs.t);
                self.regs.a = self.regs.t;
                self.sdrop();
            }

            0o34 => {
                // REPT: restart the current slot unless R's bit 16 is set.
                // Because the slot loop always subtracts 6 after a handler
                // runs, `slot = 26` here actually resumes dispatch at bit
                // offset 20 — REPT only loops as intended when it is itself
                // encoded at slot 20 (see DESIGN.md).
                if self.regs.r & 0x1_0000 == 0 {
                    *slot = 26;
                }
                let new_r = self.regs.r.wrapping_sub(1);
                self.trace_first(RID_R, self.regs.r, new_r);
                self.regs.r = new_r;
            }

            0o35 => {
                // 2/ (arithmetic shift)
                let v = ((self.regs.t as i32) >> 1) as u32;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
            }

            0o36 => {
                // C@A
                let shift = (self.regs.a & 3) * 8;
                self.fetch_x(self.regs.a >> 2, shift, 0xFF);
            }

            0o37 => {
                // B!
                self.trace_first(RID_B, self.regs.b, self.regs.t);
                self.regs.b = self.regs.t;
                self.sdrop();
            }

            0o40 => {
                // SP@
                let m = imm.wrapping_add(self.regs.sp).wrapping_add(ROM as u32).wrapping_mul(4);
                self.trace_first(RID_A, self.regs.a, m);
                self.regs.a = m;
                return Some(self.regs.pc);
            }

            0o41 => {
                // COM
                let v = !self.regs.t;
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
            }

            0o42 => self.store_x(self.regs.a >> 2, self.regs.t, 0, 0xFFFF_FFFF), // !A

            0o43 => {
                // RP!
                let v = (self.regs.t >> 2) & 0xFF;
                self.trace_first(RID_RP, self.regs.rp, v);
                self.regs.rp = v;
                self.sdrop();
            }

            0o44 => {
                // RP@
                let m = imm.wrapping_add(self.regs.rp).wrapping_add(ROM as u32).wrapping_mul(4);
                self.trace_first(RID_A, self.regs.a, m);
                self.regs.a = m;
                return Some(self.regs.pc);
            }

            0o45 => {
                // PORT: swap T and DebugReg. Untraced in the original — no
                // `Trace` calls guard this case there either.
                let m = self.regs.t;
                self.regs.t = self.regs.debug;
                self.regs.debug = m;
            }

            0o46 => {
                // !B+
                self.store_x(self.regs.b >> 2, self.regs.t, 0, 0xFFFF_FFFF);
                let new_b = self.regs.b.wrapping_add(4);
                self.trace_plain(RID_B, self.regs.b, new_b);
                self.regs.b = new_b;
            }

            0o47 => {
                // SP!: no trailing SDROP.
                let v = (self.regs.t >> 2) & 0xFF;
                self.trace_first(RID_SP, self.regs.sp, v);
                self.regs.sp = v;
            }

            0o50 => {
                // UP@
                let m = imm.wrapping_add(self.regs.up).wrapping_add(ROM as u32).wrapping_mul(4);
                self.trace_first(RID_A, self.regs.a, m);
                self.regs.a = m;
                return Some(self.regs.pc);
            }

            0o52 => {
                // W!A
                let shift = (self.regs.a & 2) * 8;
                self.store_x(self.regs.a >> 2, self.regs.t, shift, 0xFFFF);
            }

            0o53 => {
                // UP!
                let v = (self.regs.t >> 2) & 0xFF;
                self.trace_first(RID_UP, self.regs.up, v);
                self.regs.up = v;
                self.sdrop();
            }

            0o54 => {
                // SH24
                let v = (self.regs.t << 24) | (imm & 0xFF_FFFF);
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
                return Some(self.regs.pc);
            }

            0o56 => {
                // C!A
                let shift = (self.regs.a & 3) * 8;
                self.store_x(self.regs.a >> 2, self.regs.t, shift, 0xFF);
            }

            0o60 => {
                // USER
                let v = self.user.call(self.regs.t, self.regs.n, imm);
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
                return Some(self.regs.pc);
            }

            0o63 => self.snip(), // NIP

            0o64 => {
                // JUMP
                self.pc_write(imm, paused);
                return Some(self.regs.pc);
            }

            0o66 => {
                // @AS: ReceiveAXI(T/4, N&0xFF); A,T += 4*((N&0xFF)+1)
                let len = self.regs.n & 0xFF;
                self.mem.receive_axi(self.regs.a, self.regs.t / 4, len);
                let delta = 4 * (len + 1);
                let new_a = self.regs.a.wrapping_add(delta);
                self.trace_first(RID_A, self.regs.a, new_a);
                self.regs.a = new_a;
                let new_t = self.regs.t.wrapping_add(delta);
                self.trace_plain(RID_T, self.regs.t, new_t);
                self.regs.t = new_t;
            }

            0o70 => {
                // LIT
                self.sdup();
                self.trace_plain(RID_T, self.regs.t, imm);
                self.regs.t = imm;
                return Some(self.regs.pc);
            }

            0o72 => self.sdrop(), // DROP

            0o73 => {
                // ROT
                let idx = (self.regs.sp as usize) & (RAM - 1);
                let m = self.mem.ram_cell(idx);
                self.trace_first(idx as i32, m, self.regs.n);
                self.mem.set_ram_cell(idx, self.regs.n);
                self.trace_plain(RID_N, self.regs.n, self.regs.t);
                self.regs.n = self.regs.t;
                self.trace_plain(RID_T, self.regs.t, m);
                self.regs.t = m;
            }

            0o74 => {
                // CALL
                self.rdup();
                let new_r = self.regs.pc << 2;
                self.trace_plain(RID_R, self.regs.r, new_r);
                self.regs.r = new_r;
                self.pc_write(imm, paused);
                return Some(self.regs.pc);
            }

            0o75 => {
                // 1+
                let v = self.regs.t.wrapping_add(1);
                self.trace_first(RID_T, self.regs.t, v);
                self.regs.t = v;
            }

            0o76 => {
                // >R
                self.rdup();
                self.trace_plain(RID_R, self.regs.r, self.regs.t);
                self.regs.r = self.regs.t;
                self.sdrop();
            }

            0o77 => {
                // SWAP
                let m = self.regs.n;
                self.trace_first(RID_N, self.regs.n, self.regs.t);
                self.regs.n = self.regs.t;
                self.trace_plain(RID_T, self.regs.t, m);
                self.regs.t = m;
            }

            _ => {} // unlisted opcodes are NOPs
        }
        None
    }
}
