//! Error-code surface.
//!
//! Three kinds, carried as plain `i32` constants rather than an enum so the
//! numeric contract matches the original's `tiffIOR` / return-code
//! convention exactly (mirrored in this workspace by `syscall`'s raw-integer
//! `SyscallId` return codes rather than a wrapping `Result`-per-FFI-call
//! scheme).

/// Address or byte offset was not a multiple of 4.
pub const ERR_ALIGNMENT: i32 = -23;
/// Address fell outside the addressed region.
pub const ERR_RANGE: i32 = -9;
/// An AXI burst write would have flipped a bit from 0 to 1 without an
/// intervening erase.
pub const ERR_ERASE_VIOLATION: i32 = -60;
