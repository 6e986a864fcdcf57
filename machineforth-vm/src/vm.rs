//! Public control surface: construction, power-on reset, debug mailbox,
//! ROM writing, AXI sector erase, undo, and read-only introspection.
//!
//! Shaped after `kernel-vm`'s `AddressSpace<Meta, M: PageManager<Meta>>`:
//! the three region sizes and the two host hooks are `const`/type
//! parameters of `Vm` rather than fields of a runtime config struct, so a
//! misconfigured `RAMsize` is a compile-time assertion failure (see
//! `Vm::_RAM_MUST_BE_POWER_OF_TWO` below) instead of a wrap bug a host has
//! to remember to test for.

use crate::memory::Memory;
use crate::regs::Registers;
use crate::trace::{NoTracer, NoUserFunction, Tracer, UserFunction};

/// Emulator core for a 32-bit stack-oriented MachineForth processor.
///
/// `ROM`/`RAM`/`AXI` are cell counts, chosen by the host at monomorphization
/// time. `RAMsize` (`RAM`) MUST be a power of two — `Vm::new`/`with_hooks`
/// enforce this with a `const`-evaluated assertion, not a runtime check, so
/// a bad size fails to compile rather than silently misbehaving via the
/// `& (RAMsize-1)` wrap used throughout `stack.rs`.
///
/// `U` is the host's opcode-060 (`USER`) implementation; `TR` is the host's
/// tracer. Both default to zero-cost no-ops (`NoUserFunction`, `NoTracer`)
/// so a host that needs neither can write `Vm::<ROM, RAM, AXI>::new()`.
pub struct Vm<const ROM: usize, const RAM: usize, const AXI: usize, U = NoUserFunction, TR = NoTracer> {
    pub(crate) regs: Registers,
    pub(crate) mem: Memory<ROM, RAM, AXI>,
    pub(crate) user: U,
    pub(crate) tracer: TR,
    pub(crate) op_counters: [u32; 64],
    pub(crate) cycle: u64,
    /// First-change-of-slot flag; see §4.6. Reset to `true` at the top of
    /// every slot/tail dispatch in `dispatch.rs`.
    pub(crate) new_slot: bool,
}

impl<const ROM: usize, const RAM: usize, const AXI: usize, U: UserFunction, TR: Tracer> Vm<ROM, RAM, AXI, U, TR> {
    /// Evaluated once at monomorphization; a non-power-of-two `RAM` is a
    /// compile error wherever `Vm::<ROM, RAM, AXI, ..>` is named.
    #[allow(non_upper_case_globals)]
    const _RAM_MUST_BE_POWER_OF_TWO: () = assert!(RAM.is_power_of_two(), "RAMsize must be a power of two");

    /// Construct a VM with explicit hook instances, already power-on reset.
    pub fn with_hooks(user: U, tracer: TR) -> Self {
        let () = Self::_RAM_MUST_BE_POWER_OF_TWO;
        let mut vm = Vm {
            regs: Registers::default(),
            mem: Memory::new(),
            user,
            tracer,
            op_counters: [0; 64],
            cycle: 0,
            new_slot: true,
        };
        vm.reset();
        vm
    }

    /// Power-on reset (§4.5): clears opcode counters, cycle counter, and
    /// RAM; sets `PC=0, RP=64, SP=32, UP=64`; zeroes the rest of the
    /// register file. ROM and AXI persist.
    pub fn reset(&mut self) {
        log::debug!("power-on reset");
        self.regs.reset();
        self.mem.reset();
        self.op_counters = [0; 64];
        self.cycle = 0;
        self.new_slot = true;
    }

    pub fn set_debug(&mut self, n: u32) {
        self.regs.debug = n;
    }

    pub fn get_debug(&self) -> u32 {
        self.regs.debug
    }

    /// Store `data` into ROM at `byte_addr`. Unconditional (no erase check);
    /// only alignment and range are validated.
    pub fn write_rom(&mut self, data: u32, byte_addr: u32) -> i32 {
        let result = self.mem.write_rom(data, byte_addr);
        if result != 0 {
            log::warn!("write_rom({data:#x}, {byte_addr:#x}) rejected: {result}");
        }
        result
    }

    /// Erase the 4 KB AXI sector starting at `byte_addr`.
    pub fn erase_axi_4k(&mut self, byte_addr: u32) -> i32 {
        let result = self.mem.erase_axi_4k(byte_addr);
        if result != 0 {
            log::warn!("erase_axi_4k({byte_addr:#x}) rejected: {result}");
        } else {
            log::debug!("erase_axi_4k({byte_addr:#x})");
        }
        result
    }

    /// Last AXI-burst error code (the original's `tiffIOR`), set by `!AS`/
    /// `@AS`'s underlying `send_axi`/`receive_axi`.
    pub fn ior(&self) -> i32 {
        self.mem.ior()
    }

    /// Reverse a single traced mutation: write `old` back to the register
    /// or RAM cell `id` designates (§4.6). Replaying a trace stream's
    /// records in reverse order with this primitive restores exact prior
    /// state.
    pub fn untrace(&mut self, id: i32, old: u32) {
        if id < 0 {
            self.regs.set_by_id(id, old);
        } else {
            self.mem.set_ram_cell((id as usize) & (RAM - 1), old);
        }
    }

    /// Opcode-execution counters, one per 6-bit opcode, saturating. Only
    /// meaningful when `TR::ENABLED`; a `NoTracer` VM leaves these at 0.
    pub fn op_counters(&self) -> &[u32; 64] {
        &self.op_counters
    }

    /// Cycles executed since the last reset (one per slot, plus 3 for every
    /// PC-mutating slot). Only meaningful when `TR::ENABLED`.
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    /// Read a 32-bit cell through the ROM/RAM/AXI decode chain without
    /// mutating state or invoking the tracer (§4.8).
    pub fn peek_cell(&self, byte_addr: u32) -> u32 {
        self.mem.peek_cell(byte_addr)
    }

    pub fn peek_byte(&self, byte_addr: u32) -> u8 {
        self.mem.peek_byte(byte_addr)
    }

    pub fn peek_half(&self, byte_addr: u32) -> u16 {
        self.mem.peek_half(byte_addr)
    }

    /// Current data-stack depth in cells, derived from `SP`'s distance from
    /// its reset value (mirrors `vmaccess.h`'s `FetchSP`).
    pub fn stack_depth(&self) -> u32 {
        (crate::regs::INITIAL_SP.wrapping_sub(self.regs.sp)) & (RAM as u32 - 1)
    }

    /// `(T, N)` — the top two data-stack cells, for a debugger's stack
    /// display.
    pub fn data_stack_top(&self) -> (u32, u32) {
        (self.regs.t, self.regs.n)
    }

    pub fn pc(&self) -> u32 {
        self.regs.pc
    }
}

impl<const ROM: usize, const RAM: usize, const AXI: usize, U: UserFunction + Default, TR: Tracer + Default>
    Vm<ROM, RAM, AXI, U, TR>
{
    /// Construct a VM with default hooks, already power-on reset.
    pub fn new() -> Self {
        Self::with_hooks(U::default(), TR::default())
    }
}

impl<const ROM: usize, const RAM: usize, const AXI: usize, U: UserFunction + Default, TR: Tracer + Default> Default
    for Vm<ROM, RAM, AXI, U, TR>
{
    fn default() -> Self {
        Self::new()
    }
}
