//! Three-region memory model: ROM, RAM, AXI.
//!
//! Grounded on `original_source/Tiff/src/vm.c`'s static `ROM`/`RAM`/`AXI`
//! arrays, the region-decode chain in `FetchX`, and the `SendAXI`/
//! `ReceiveAXI`/`EraseAXI4K`/`WriteROM` functions. Sizes are caller-chosen
//! `const` generics (see `vm.rs`), so the regions are heap-backed `Vec<u32>`
//! fields rather than fixed stack arrays — the same choice
//! `other_examples`' PS1 emulator `Bus` makes for its `ram: Vec<u8>` field,
//! for the same reason (region sizes aren't known to be small at compile
//! time, even though they're fixed once chosen).

use crate::error::{ERR_ALIGNMENT, ERR_ERASE_VIOLATION, ERR_RANGE};

/// One 4 KB erase sector, in cells.
const SECTOR_CELLS: usize = 1024;

/// `ROM`/`RAM`/`AXI` cell arrays plus the last AXI-burst error code (the
/// original's `tiffIOR` global).
pub struct Memory<const ROM: usize, const RAM: usize, const AXI: usize> {
    rom: Vec<u32>,
    ram: Vec<u32>,
    axi: Vec<u32>,
    ior: i32,
}

impl<const ROM: usize, const RAM: usize, const AXI: usize> Memory<ROM, RAM, AXI> {
    pub fn new() -> Self {
        Memory {
            rom: vec![0; ROM],
            ram: vec![0; RAM],
            axi: vec![0; AXI],
            ior: 0,
        }
    }

    /// Clears RAM. ROM and AXI persist across a power-on reset (§4.5).
    pub fn reset(&mut self) {
        self.ram.iter_mut().for_each(|c| *c = 0);
    }

    /// Direct access to a RAM cell, already wrapped by the caller — used by
    /// the stack primitives in `stack.rs`, which index RAM by `SP`/`RP`
    /// directly rather than going through the ROM/RAM/AXI decode chain.
    pub fn ram_cell(&self, idx: usize) -> u32 {
        self.ram[idx]
    }

    pub fn set_ram_cell(&mut self, idx: usize, value: u32) {
        self.ram[idx] = value;
    }

    /// Generic ROM/RAM/AXI decode used by `FetchX` and the read-only
    /// introspection accessors. `addr` is a cell address. Out-of-range reads
    /// yield 0 — deterministic observation of uninitialised space, by design
    /// (§7). Preserved literally from the original: the AXI arm is reached
    /// only when `addr < AXIsize` directly (not relative to `ROMsize+RAMsize`),
    /// matching `FetchX`'s own `else if (addr < AXIsize) temp = AXI[addr];`.
    fn decode_read(&self, addr: u32) -> u32 {
        let addr = addr as usize;
        if addr < ROM {
            self.rom[addr]
        } else if addr < ROM + RAM {
            self.ram[addr - ROM]
        } else if addr < AXI {
            self.axi[addr]
        } else {
            0
        }
    }

    /// `peek_cell`/`peek_byte`/`peek_half`: read-only accessors for a host
    /// debugger's memory window (§4.8), grounded in
    /// `original_source/Tiff/src/vmaccess.h`'s `FetchCell`/`FetchByte`/
    /// `FetchHalf`. `byte_addr` is a byte address, matching the convention
    /// `write_rom`/`erase_axi_4k` already use; these never mutate state or
    /// invoke the tracer.
    pub fn peek_cell(&self, byte_addr: u32) -> u32 {
        self.decode_read(byte_addr >> 2)
    }

    pub fn peek_byte(&self, byte_addr: u32) -> u8 {
        let cell = self.decode_read(byte_addr >> 2);
        ((cell >> ((byte_addr & 3) * 8)) & 0xFF) as u8
    }

    pub fn peek_half(&self, byte_addr: u32) -> u16 {
        let cell = self.decode_read(byte_addr >> 2);
        ((cell >> ((byte_addr & 2) * 8)) & 0xFFFF) as u16
    }

    /// `FetchX`'s region decode, re-exposed to `dispatch.rs` (which still
    /// owns the `SDUP` + `T` write that make up the rest of `FetchX`).
    pub(crate) fn fetch_decode(&self, cell_addr: u32, shift: u32, mask: u32) -> u32 {
        (self.decode_read(cell_addr) >> shift) & mask
    }

    /// `StoreX`'s RAM read-modify-write, minus the `SDROP` that
    /// `dispatch.rs` performs around it. Returns `(old_cell, new_cell)` so
    /// the caller can trace the change before committing it. Only RAM is
    /// writable this way; `addr` wraps by `RAMsize-1`.
    pub(crate) fn store_prepare(&self, addr: u32, data: u32, shift: u32, mask: u32) -> (usize, u32, u32) {
        let idx = (addr as usize) & (RAM - 1);
        let old = self.ram[idx];
        let cleared = old & !(mask << shift);
        let new = cleared | ((data & mask) << shift);
        (idx, old, new)
    }

    /// Last AXI-burst error code (the original's `tiffIOR`).
    pub fn ior(&self) -> i32 {
        self.ior
    }

    /// `SendAXI`: stream `length+1` words from `RAM[(A/4)-ROMsize ..]` into
    /// `AXI[dest_cell ..]`, enforcing the NOR-flash write-without-erase rule
    /// (no bit may transition 0→1). Rejects without mutating AXI on any
    /// violation.
    pub fn send_axi(&mut self, a_reg: u32, dest_cell: u32, length: u32) {
        let src0 = (a_reg as i64 / 4) - ROM as i64;
        let out_of_range = src0 < 0
            || src0 >= RAM as i64 - length as i64
            || dest_cell as i64 >= AXI as i64 - length as i64;
        if out_of_range {
            self.ior = ERR_RANGE;
            log::warn!("send_axi(dest={dest_cell:#x}, len={length}) rejected: out of range");
            return;
        }
        let mut src = src0 as usize;
        let mut dest = dest_cell as usize;
        for _ in 0..=length {
            let old = self.axi[dest];
            let data = self.ram[src];
            if !(old | data) != 0 {
                self.ior = ERR_ERASE_VIOLATION;
                log::warn!("send_axi: write at AXI[{dest:#x}] would set a bit without an erase");
                return;
            }
            self.axi[dest] = old & data;
            src += 1;
            dest += 1;
        }
    }

    /// `ReceiveAXI`: stream `length+1` words from `AXI[src_cell ..]` into
    /// `RAM[(A/4)-ROMsize ..]`.
    ///
    /// The original C `ReceiveAXI` passes its arguments to `memmove` in a
    /// way that, read against its own `src`/`dest` local variable names,
    /// actually copies `RAM` into `AXI` rather than the reverse — this
    /// looks like a transcription bug against the opcode's own name, `@AS`
    /// ("fetch AXI stream"). Resolved per the open question in §9: cells
    /// flow from AXI into RAM, the natural reading of the opcode name, and
    /// mirroring `send_axi`'s direction in reverse.
    pub fn receive_axi(&mut self, a_reg: u32, src_cell: u32, length: u32) {
        let dest0 = (a_reg as i64 / 4) - ROM as i64;
        let out_of_range = dest0 < 0
            || dest0 >= RAM as i64 - length as i64
            || src_cell as i64 >= AXI as i64 - length as i64;
        if out_of_range {
            self.ior = ERR_RANGE;
            log::warn!("receive_axi(src={src_cell:#x}, len={length}) rejected: out of range");
            return;
        }
        let dest = dest0 as usize;
        let src = src_cell as usize;
        let len = length as usize + 1;
        self.ram[dest..dest + len].copy_from_slice(&self.axi[src..src + len]);
    }

    /// `EraseAXI4K`: erase the 4 KB (1024-cell) sector starting at
    /// `byte_addr`, setting every cell to `0xFFFFFFFF`.
    pub fn erase_axi_4k(&mut self, byte_addr: u32) -> i32 {
        if byte_addr & 3 != 0 {
            return ERR_ALIGNMENT;
        }
        let cell = (byte_addr / 4) as usize;
        if cell > AXI - SECTOR_CELLS {
            return ERR_RANGE;
        }
        for c in &mut self.axi[cell..cell + SECTOR_CELLS] {
            *c = 0xFFFF_FFFF;
        }
        0
    }

    /// `WriteROM`: unconditional write (no erase check — real hardware would
    /// enforce write-once externally, not the emulator).
    pub fn write_rom(&mut self, data: u32, byte_addr: u32) -> i32 {
        if byte_addr & 3 != 0 {
            return ERR_ALIGNMENT;
        }
        let cell = (byte_addr / 4) as usize;
        if cell >= ROM {
            return ERR_RANGE;
        }
        self.rom[cell] = data;
        0
    }
}

impl<const ROM: usize, const RAM: usize, const AXI: usize> Default for Memory<ROM, RAM, AXI> {
    fn default() -> Self {
        Self::new()
    }
}
