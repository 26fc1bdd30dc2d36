//! Patch state owned by one running emulation session.
//!
//! A [`PatchSession`] holds everything that is applied to guest memory while the game runs:
//! the Riivolution memory patches, the registry of memory patches that are re-applied every
//! frame, the frame patches, and the speed-hack table. The registry may be changed from any
//! thread while the emulation thread calls [`PatchSession::apply_frame_patches`].

use crate::frame::{self, FramePatch};
use crate::host::HostFs;
use crate::memory::{self, GuestMemory, MemoryPatchOutcome};
use crate::model::{Memory, Patch};
use camino::Utf8PathBuf;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// CPU state needed to decide whether guest memory may be patched right now.
pub trait GuestCpu: GuestMemory {
    /// Whether data and instruction address translation are both enabled.
    fn translation_enabled(&self) -> bool;

    /// Current stack pointer (GPR1).
    fn stack_pointer(&self) -> u32;

    fn is_ram_address(&self, address: u32) -> bool;

    fn is_instruction_address(&self, address: u32) -> bool;

    fn read_instruction(&self, address: u32) -> Option<u32> {
        self.read_u32(address)
    }
}

/// A memory patch together with the root its value file is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMemoryPatch {
    pub patch_id: String,
    pub root: Utf8PathBuf,
    pub memory: Memory,
}

pub struct PatchSession {
    host: Box<dyn HostFs + Send + Sync>,
    memory_patches: Vec<SessionMemoryPatch>,
    active: Mutex<BTreeSet<usize>>,
    frame_patches: Vec<FramePatch>,
    speed_hacks: BTreeMap<u32, u32>,
}

impl PatchSession {
    pub fn new(host: impl HostFs + Send + Sync + 'static) -> Self {
        Self {
            host: Box::new(host),
            memory_patches: Vec::new(),
            active: Mutex::new(BTreeSet::new()),
            frame_patches: Vec::new(),
            speed_hacks: BTreeMap::new(),
        }
    }

    /// Append the memory entries of `patches`. Returns the number of entries loaded.
    ///
    /// Indices used by [`add_memory_patch`](Self::add_memory_patch) count entries in load
    /// order across all calls.
    pub fn load_memory_patches(&mut self, patches: &[Patch]) -> usize {
        let before = self.memory_patches.len();
        for patch in patches {
            self.memory_patches
                .extend(patch.memory_patches.iter().map(|memory| SessionMemoryPatch {
                    patch_id: patch.id.clone(),
                    root: patch.root.clone(),
                    memory: memory.clone(),
                }));
        }

        let loaded = self.memory_patches.len() - before;
        tracing::info!("Loaded {} memory patch(es)", loaded);
        loaded
    }

    pub fn load_frame_patches(&mut self, patches: Vec<FramePatch>) {
        tracing::info!("Loaded {} frame patch(es)", patches.len());
        self.frame_patches.extend(patches);
    }

    /// Parse and merge `ADDRESS = CYCLES` lines into the speed-hack table.
    pub fn load_speed_hacks<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hacks = frame::parse_speed_hacks(lines);
        tracing::debug!("Loaded {} speed hack(s)", hacks.len());
        self.speed_hacks.extend(hacks);
    }

    /// Extra cycles to charge at `address`, 0 when there is no speed hack for it.
    pub fn speed_hack_cycles(&self, address: u32) -> u32 {
        self.speed_hacks.get(&address).copied().unwrap_or(0)
    }

    pub fn memory_patches(&self) -> &[SessionMemoryPatch] {
        &self.memory_patches
    }

    pub fn frame_patches(&self) -> &[FramePatch] {
        &self.frame_patches
    }

    /// Start re-applying memory patch `index` on every frame.
    ///
    /// Returns false when no memory patch has that index.
    pub fn add_memory_patch(&self, index: usize) -> bool {
        if index >= self.memory_patches.len() {
            tracing::warn!("No memory patch with index {}", index);
            return false;
        }
        self.registry().insert(index);
        true
    }

    /// Stop re-applying memory patch `index`. Returns whether it was active.
    pub fn remove_memory_patch(&self, index: usize) -> bool {
        self.registry().remove(&index)
    }

    /// Snapshot of the active memory patch indices, ascending.
    pub fn active_memory_patches(&self) -> Vec<usize> {
        self.registry().iter().copied().collect()
    }

    /// Apply every loaded memory patch once, e.g. right before jumping to the executable.
    pub fn apply_boot_patches(&self, memory: &mut dyn GuestMemory) -> Vec<MemoryPatchOutcome> {
        let outcomes: Vec<_> = self
            .memory_patches
            .iter()
            .map(|p| self.apply_one(p, memory))
            .collect();

        tracing::info!(
            "Boot: {}/{} memory patch(es) written",
            outcomes.iter().filter(|o| o.is_written()).count(),
            outcomes.len()
        );
        outcomes
    }

    /// Apply the frame patches, then the active memory patches.
    ///
    /// Returns false without touching memory when the CPU is not in a state where memory
    /// can be patched; the caller retries on a later cycle.
    pub fn apply_frame_patches<C: GuestCpu>(&self, cpu: &mut C) -> bool {
        if !cpu.translation_enabled() || !is_stack_sane(&*cpu) {
            tracing::debug!(
                "Deferring frame patches (translation={}, sp={:#010x})",
                cpu.translation_enabled(),
                cpu.stack_pointer()
            );
            return false;
        }

        for patch in &self.frame_patches {
            patch.apply(&mut *cpu);
        }

        let active = self.active_memory_patches();
        for index in active {
            if let Some(patch) = self.memory_patches.get(index) {
                self.apply_one(patch, &mut *cpu);
            }
        }
        true
    }

    /// Drop all loaded patches, the active registry and the speed-hack table.
    pub fn shutdown(&mut self) {
        self.memory_patches.clear();
        self.registry().clear();
        self.frame_patches.clear();
        self.speed_hacks.clear();
        tracing::debug!("Patch session shut down");
    }

    fn apply_one(
        &self,
        patch: &SessionMemoryPatch,
        memory: &mut dyn GuestMemory,
    ) -> MemoryPatchOutcome {
        memory::apply_memory_patch(self.host.as_ref(), &patch.root, &patch.memory, memory)
    }

    fn registry(&self) -> MutexGuard<'_, BTreeSet<usize>> {
        // The set stays consistent even if a holder panicked.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Heuristic check that the guest is running normal code with at least two stack frames.
///
/// The back-chain word at SP must point to a higher RAM address, and the link register
/// saved in that frame must point to a non-zero instruction.
pub fn is_stack_sane(cpu: &dyn GuestCpu) -> bool {
    let sp = cpu.stack_pointer();
    if !cpu.is_ram_address(sp) {
        return false;
    }

    let Some(next_sp) = cpu.read_u32(sp) else {
        return false;
    };
    let saved_lr_address = next_sp.wrapping_add(4);
    if next_sp <= sp || !cpu.is_ram_address(next_sp) || !cpu.is_ram_address(saved_lr_address) {
        return false;
    }

    let Some(lr) = cpu.read_u32(saved_lr_address) else {
        return false;
    };
    cpu.is_instruction_address(lr) && cpu.read_instruction(lr).is_some_and(|i| i != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalFs;
    use crate::memory::RamImage;
    use std::sync::Arc;
    use std::thread;

    const BASE: u32 = 0x8000_0000;

    struct TestCpu {
        ram: RamImage,
        translation: bool,
        sp: u32,
    }

    impl TestCpu {
        /// RAM with a sane two-frame stack at 0x80000100 -> 0x80000200 -> lr 0x80000300.
        fn sane() -> Self {
            let mut ram = RamImage::new(BASE, vec![0u8; 0x1000]);
            ram.write_u32(BASE + 0x100, BASE + 0x200);
            ram.write_u32(BASE + 0x204, BASE + 0x300);
            ram.write_u32(BASE + 0x300, 0x4E80_0020);
            Self {
                ram,
                translation: true,
                sp: BASE + 0x100,
            }
        }
    }

    impl GuestMemory for TestCpu {
        fn read_u8(&self, address: u32) -> Option<u8> {
            self.ram.read_u8(address)
        }

        fn write_u8(&mut self, address: u32, value: u8) {
            self.ram.write_u8(address, value)
        }
    }

    impl GuestCpu for TestCpu {
        fn translation_enabled(&self) -> bool {
            self.translation
        }

        fn stack_pointer(&self) -> u32 {
            self.sp
        }

        fn is_ram_address(&self, address: u32) -> bool {
            self.ram.contains(address)
        }

        fn is_instruction_address(&self, address: u32) -> bool {
            self.ram.contains(address)
        }
    }

    fn memory_patch(offset: u32, value: &[u8]) -> Patch {
        Patch {
            id: format!("p{offset:x}"),
            memory_patches: vec![Memory {
                offset,
                value: value.to_vec(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn session() -> PatchSession {
        let mut session = PatchSession::new(LocalFs);
        session.load_memory_patches(&[
            memory_patch(BASE + 0x800, &[0x11]),
            memory_patch(BASE + 0x801, &[0x22]),
        ]);
        session
    }

    #[test]
    fn test_stack_sanity() {
        let cpu = TestCpu::sane();
        assert!(is_stack_sane(&cpu));

        let mut outside = TestCpu::sane();
        outside.sp = 0x1000;
        assert!(!is_stack_sane(&outside));

        let mut downward = TestCpu::sane();
        downward.ram.write_u32(BASE + 0x100, BASE + 0x80);
        assert!(!is_stack_sane(&downward));

        let mut zero_instruction = TestCpu::sane();
        zero_instruction.ram.write_u32(BASE + 0x300, 0);
        assert!(!is_stack_sane(&zero_instruction));
    }

    #[test]
    fn test_frame_pass_deferred_when_unsafe() {
        let session = session();
        session.add_memory_patch(0);

        let mut cpu = TestCpu::sane();
        cpu.translation = false;
        assert!(!session.apply_frame_patches(&mut cpu));
        assert_eq!(cpu.read_u8(BASE + 0x800), Some(0));

        cpu.translation = true;
        assert!(session.apply_frame_patches(&mut cpu));
        assert_eq!(cpu.read_u8(BASE + 0x800), Some(0x11));
        assert_eq!(cpu.read_u8(BASE + 0x801), Some(0));
    }

    #[test]
    fn test_frame_patches_run_before_memory_patches() {
        let mut session = session();
        let mut frame_patches = frame::parse_frame_section(["$Poke", "0x80000800:byte:0x77"]);
        frame_patches[0].enabled = true;
        session.load_frame_patches(frame_patches);
        session.add_memory_patch(0);

        let mut cpu = TestCpu::sane();
        assert!(session.apply_frame_patches(&mut cpu));
        assert_eq!(cpu.read_u8(BASE + 0x800), Some(0x11));
    }

    #[test]
    fn test_registry() {
        let session = session();
        assert!(session.add_memory_patch(1));
        assert!(session.add_memory_patch(0));
        assert!(session.add_memory_patch(1));
        assert!(!session.add_memory_patch(2));
        assert_eq!(session.active_memory_patches(), vec![0, 1]);

        assert!(session.remove_memory_patch(1));
        assert!(!session.remove_memory_patch(1));
        assert_eq!(session.active_memory_patches(), vec![0]);
    }

    #[test]
    fn test_registry_from_other_threads() {
        let mut session = PatchSession::new(LocalFs);
        let patches: Vec<Patch> = (0..64).map(|i| memory_patch(BASE + i, &[1])).collect();
        session.load_memory_patches(&patches);
        let session = Arc::new(session);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for i in (t..64).step_by(4) {
                        session.add_memory_patch(i);
                    }
                })
            })
            .collect();

        let mut cpu = TestCpu::sane();
        while !handles.iter().all(|h| h.is_finished()) {
            session.apply_frame_patches(&mut cpu);
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(session.active_memory_patches(), (0..64).collect::<Vec<_>>());
        assert!(session.apply_frame_patches(&mut cpu));
        assert!((0..64).all(|i| cpu.read_u8(BASE + i) == Some(1)));
    }

    #[test]
    fn test_boot_patches_apply_everything_once() {
        let session = session();
        let mut ram = RamImage::new(BASE, vec![0u8; 0x1000]);

        let outcomes = session.apply_boot_patches(&mut ram);
        assert_eq!(outcomes, vec![MemoryPatchOutcome::Written(1); 2]);
        assert_eq!(ram.read_u16(BASE + 0x800), Some(0x1122));
        assert!(session.active_memory_patches().is_empty());
    }

    #[test]
    fn test_speed_hacks_and_shutdown() {
        let mut session = session();
        session.load_speed_hacks(["0x80001234=40"]);
        session.add_memory_patch(0);

        assert_eq!(session.speed_hack_cycles(0x8000_1234), 40);
        assert_eq!(session.speed_hack_cycles(0x8000_1238), 0);

        session.shutdown();
        assert_eq!(session.speed_hack_cycles(0x8000_1234), 0);
        assert!(session.memory_patches().is_empty());
        assert!(session.active_memory_patches().is_empty());
    }
}
