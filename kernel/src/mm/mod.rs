//! Virtual-memory manager.

pub mod frames;
pub mod page_table;
pub mod vmm;

pub fn init() {
    vmm::init();
}
