//! A 32-bit stack-oriented MachineForth processor emulator.
//!
//! The instruction word packs up to five 6-bit opcode slots plus a 2-bit
//! tail; `Vm::step` dispatches one packed word at a time against a
//! three-region ROM/RAM/AXI memory model. Every register and memory
//! mutation can be observed through a host-supplied [`Tracer`](trace::Tracer)
//! and exactly undone through [`Vm::untrace`], and AXI bursts enforce a
//! NOR-flash write-without-erase discipline.
//!
//! Region sizes and the two host hooks (`USER` opcode, tracer) are
//! monomorphized into [`Vm`] as `const`/type parameters rather than carried
//! as runtime configuration, so a misconfigured RAM size fails at compile
//! time.

mod dispatch;
mod error;
mod memory;
mod regs;
mod stack;
mod trace;
mod vm;

pub use error::{ERR_ALIGNMENT, ERR_ERASE_VIOLATION, ERR_RANGE};
pub use regs::{
    INITIAL_PC, INITIAL_RP, INITIAL_SP, INITIAL_UP, RID_A, RID_B, RID_DEBUG, RID_N, RID_PC, RID_R, RID_RP, RID_SP,
    RID_T, RID_UP,
};
pub use trace::{NoTracer, NoUserFunction, Tracer, UserFunction, TRACE_NEW_GROUP, TRACE_NEW_SLOT, TRACE_SUBSEQUENT};
pub use vm::Vm;
