//! Device controller: probe, lifecycle sequencing and the poll entry points.
//!
//! One [`Rtl83xxNic`] owns the buffer pool and every ring of one switch. Ring cursors,
//! buffer headers and register read-modify-write sequences are only touched with the
//! device lock held. The interrupt handler reads and acknowledges status under that lock
//! and posts the rest to the [`IrqCoordinator`]; poll tasks then call
//! [`Rtl83xxNic::service`] or the individual task entry points.

use alloc::vec::Vec;
use core::sync::atomic::AtomicU8;
use core::time::Duration;

use anyhow::Context;

use super::common::{RegisterIo, Rtl83xxCommon};
use super::device_info::{SwitchFamilyInfo, find_family};
use super::irq::{IrqCoordinator, PollTask};
use super::kernel_func::KernelFunc;
use super::notify::{FdbMailbox, drain_notify_ring};
use super::pool::{BufferPool, RingGeometry, RingKind};
use super::profile::{RegisterProfile, RxMode};
use super::recovery::recover_ring;
use super::ring::DescriptorRing;
use super::rx::{RxFrame, RxPath};
use super::tx::{TxPath, TxRequest, pick_ring};
use super::{EthernetAddress, FdbSink, FrameSink};
use crate::config::NicConfig;
use crate::hal::Mutex;
use crate::{InitResult, NicError, NicResult};

/// Traffic and error counters of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NicStats {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Frames lost to low memory, runts or ring recovery.
    pub rx_dropped: u64,
    /// Slots handed back to the switch by ring recovery.
    pub rx_recovered: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Transmits refused because the switch still owned the slot.
    pub tx_busy: u64,
    /// Drain passes where the switch position disagreed with the ring cursor.
    pub ring_contention: u64,
    pub fdb_events: u64,
    /// Events lost because the FDB mailbox was full.
    pub fdb_dropped: u64,
}

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicState {
    /// Memory allocated, DMA not started.
    Probed,
    Running,
    Stopped,
}

/// Everything guarded by the device lock.
struct NicInner<K: KernelFunc> {
    pool: BufferPool<K>,
    rx: Vec<DescriptorRing>,
    tx: Vec<DescriptorRing>,
    notify: Option<DescriptorRing>,
    stats: NicStats,
    state: NicState,
}

impl<K: KernelFunc> NicInner<K> {
    fn new(geometry: RingGeometry) -> NicResult<Self> {
        let pool = BufferPool::new(geometry)?;
        let rings = |kind: RingKind| -> NicResult<Vec<DescriptorRing>> {
            (0..geometry.rings(kind))
                .map(|i| DescriptorRing::new(kind, i, geometry.ring_len(kind)))
                .collect()
        };
        let notify = if geometry.notify {
            Some(DescriptorRing::new(
                RingKind::Notify,
                0,
                geometry.ring_len(RingKind::Notify),
            )?)
        } else {
            None
        };
        Ok(Self {
            rx: rings(RingKind::Rx)?,
            tx: rings(RingKind::Tx)?,
            notify,
            pool,
            stats: NicStats::default(),
            state: NicState::Probed,
        })
    }
}

/// CPU port NIC of one Realtek switch.
pub struct Rtl83xxNic<IO: RegisterIo, K: KernelFunc> {
    io: IO,
    info: &'static SwitchFamilyInfo,
    profile: &'static dyn RegisterProfile,
    config: NicConfig,
    inner: Mutex<K, NicInner<K>>,
    irq: IrqCoordinator,
    fdb: FdbMailbox<K>,
    tx_rr: AtomicU8,
}

impl<IO: RegisterIo, K: KernelFunc> Rtl83xxNic<IO, K> {
    /// Bind to the switch identified by `family_id` and allocate its rings.
    ///
    /// Runs the family's one-time bring-up writes and settles the MAC address: the
    /// configured one if valid, else what the bootloader left in the registers, else a
    /// random locally administered address.
    pub fn probe(family_id: u16, io: IO, config: NicConfig) -> InitResult<Self> {
        let info = find_family(family_id)
            .ok_or(NicError::Unsupported(family_id))
            .context("Unknown switch family")?;
        let profile = info.profile;
        info!("[rtl83xx] probing {} (family {:#06x})", info.name, family_id);

        let inner = NicInner::new(profile.geometry()).context("Failed to allocate ring memory")?;

        for step in profile.bring_up_steps() {
            io.write32(step.reg, step.value);
            if step.busy != 0 {
                Rtl83xxCommon::wait_for_bit::<K>(
                    &io,
                    step.reg,
                    step.busy,
                    false,
                    config.reset_timeout_us,
                    step.name,
                )
                .context("Chip bring-up failed")?;
            }
        }

        let mac = match config.mac.filter(EthernetAddress::is_valid) {
            Some(mac) => {
                profile.write_mac(&io, &mac.0);
                mac
            }
            None => {
                let hw = EthernetAddress(profile.read_mac(&io));
                if hw.is_valid() {
                    hw
                } else {
                    let mac = EthernetAddress::random_local(K::current_time_us());
                    warn!("[rtl83xx] invalid MAC address {hw}, using random {mac}");
                    profile.write_mac(&io, &mac.0);
                    mac
                }
            }
        };
        info!("[rtl83xx] using MAC {mac}");

        let fdb = FdbMailbox::new(config.fdb_queue_depth);
        Ok(Self {
            io,
            info,
            profile,
            config,
            inner: Mutex::new(inner),
            irq: IrqCoordinator::new(),
            fdb,
            tx_rr: AtomicU8::new(0),
        })
    }

    pub fn family(&self) -> &'static SwitchFamilyInfo {
        self.info
    }

    pub fn config(&self) -> &NicConfig {
        &self.config
    }

    pub fn geometry(&self) -> RingGeometry {
        self.profile.geometry()
    }

    pub fn state(&self) -> NicState {
        self.inner.lock().state
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> NicStats {
        self.inner.lock().stats
    }

    pub fn irq_coordinator(&self) -> &IrqCoordinator {
        &self.irq
    }

    // ==================== Lifecycle ====================

    /// Reset the DMA engine, set up every ring and start RX/TX.
    pub fn open(&self) -> NicResult {
        let mut inner = self.inner.lock();
        if inner.state == NicState::Running {
            return Err(NicError::BadState);
        }
        info!("[rtl83xx] {}: starting DMA", self.info.name);

        self.irq.reset();
        self.fdb.clear();
        self.hw_reset()?;
        self.setup_rings(&mut inner);
        self.profile.enable_rxtx(&self.io);
        self.profile.install_traps(&self.io);
        inner.state = NicState::Running;
        Ok(())
    }

    /// Quiesce the switch side of the NIC. Ring memory stays allocated.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != NicState::Running {
            return;
        }
        info!("[rtl83xx] {}: stopping DMA", self.info.name);
        self.hw_stop();
        inner.state = NicState::Stopped;
    }

    /// Restart a wedged transmitter: stop, rebuild the rings in place and re-enable.
    pub fn tx_timeout(&self) -> NicResult {
        let mut inner = self.inner.lock();
        if inner.state != NicState::Running {
            return Err(NicError::BadState);
        }
        warn!("[rtl83xx] {}: transmit timeout, restarting DMA", self.info.name);
        self.report_tx_stall(&inner);
        self.hw_stop();
        self.setup_rings(&mut inner);
        self.profile.enable_rxtx(&self.io);
        Ok(())
    }

    /// Log every TX ring that still has frames the switch never fetched.
    ///
    /// Returns the number of such frames.
    fn report_tx_stall(&self, inner: &NicInner<K>) -> usize {
        let regs = self.profile.regs();
        let mut pending = 0;
        for ring in &inner.tx {
            let queued = (0..ring.len())
                .filter(|&slot| ring.descriptor(&inner.pool, slot).is_hw_owned())
                .count();
            if queued != 0 {
                let hw_cur = self.io.read32(regs.tx_cur(ring.index()));
                warn!(
                    "[rtl83xx] tx ring {}: {queued} pending, cursor {:#x}, hw {hw_cur:#x}",
                    ring.index(),
                    ring.cursor_bus_addr(&inner.pool)
                );
            }
            pending += queued;
        }
        pending
    }

    /// Caller holds the device lock.
    fn hw_reset(&self) -> NicResult {
        let io = &self.io;
        let regs = self.profile.regs();

        self.profile.disable_cpu_port(io);
        K::busy_wait(Duration::from_millis(100));

        self.profile.mask_all_irqs(io);
        let saved = self.profile.prepare_reset(io);

        io.write32(regs.rst_glb_ctrl, regs.reset_mask);
        Rtl83xxCommon::wait_for_bit::<K>(
            io,
            regs.rst_glb_ctrl,
            regs.reset_mask,
            false,
            self.config.reset_timeout_us,
            "NIC reset",
        )?;
        K::busy_wait(Duration::from_millis(100));

        self.profile.finish_reset(io, saved);
        Ok(())
    }

    /// Initialize every ring and program the ring base registers.
    fn setup_rings(&self, inner: &mut NicInner<K>) {
        let io = &self.io;
        let regs = self.profile.regs();
        let NicInner {
            pool,
            rx,
            tx,
            notify,
            ..
        } = inner;

        for ring in rx.iter_mut().chain(tx.iter_mut()) {
            ring.init(pool);
        }
        if let Some(ring) = notify {
            ring.init(pool);
            self.profile
                .setup_notify(io, pool.ring_bus_addr(RingKind::Notify, 0));
        }

        for ring in rx.iter() {
            let i = ring.index();
            io.write32(regs.rx_base(i), pool.ring_bus_addr(RingKind::Rx, i));
        }
        for ring in tx.iter() {
            let i = ring.index();
            io.write32(regs.tx_base(i), pool.ring_bus_addr(RingKind::Tx, i));
        }
        debug!(
            "[rtl83xx] {} RX rings, {} TX rings armed",
            rx.len(),
            tx.len()
        );
    }

    /// Caller holds the device lock.
    fn hw_stop(&self) {
        let io = &self.io;
        let regs = self.profile.regs();

        self.profile.disable_cpu_port(io);
        io.mask32(regs.dma_rxtx_en, 0, regs.dma_if_ctrl);
        K::busy_wait(Duration::from_millis(200));

        self.profile.block_ports(io);
        if let Some(flush) = self.profile.l2_flush() {
            for port in 0..=self.profile.cpu_port() {
                io.write32(flush.reg, flush.command(port));
                let flushed = Rtl83xxCommon::wait_for_bit::<K>(
                    io,
                    flush.reg,
                    flush.busy,
                    false,
                    self.config.flush_timeout_us,
                    "L2 flush",
                );
                if flushed.is_err() {
                    warn!("[rtl83xx] L2 flush stuck at port {port}, skipping the rest");
                    break;
                }
            }
        }

        self.profile.force_link_down(io);
        K::busy_wait(Duration::from_millis(100));

        self.profile.mask_all_irqs(io);
        io.write32(regs.dma_if_ctrl, 0);
        K::busy_wait(Duration::from_millis(200));

        self.irq.reset();
    }

    // ==================== Interrupts and polling ====================

    /// Interrupt handler body. Returns whether the device raised anything.
    pub fn handle_irq(&self) -> bool {
        let status = {
            let _inner = self.inner.lock();
            let status = self.profile.read_irq_status(&self.io);
            if status.is_empty() {
                return false;
            }
            self.profile.ack_irq(&self.io, &status);
            status
        };
        trace!("[rtl83xx] irq {status:?}");
        self.irq.post(&status);
        true
    }

    /// Take the next queued poll task.
    pub fn next_task(&self) -> Option<PollTask> {
        self.irq.next_task()
    }

    /// Run one poll task, returning the amount of work done.
    pub fn run_task(&self, task: PollTask, sink: &mut dyn FrameSink) -> usize {
        match task {
            PollTask::Recover { rings } => self.recover_rings(rings),
            PollTask::Notify => self.drain_notifications(),
            PollTask::Rx { ring } => self.poll_rx(ring, self.config.poll_budget, sink),
        }
    }

    /// Run the tasks queued so far, each at most once.
    ///
    /// A ring that used its whole budget stays queued for the next call.
    pub fn service(&self, sink: &mut dyn FrameSink) -> usize {
        let mut work = 0;
        for _ in 0..self.profile.geometry().rx_rings + 2 {
            let Some(task) = self.irq.next_task() else {
                break;
            };
            work += self.run_task(task, sink);
        }
        work
    }

    /// Drain RX ring `ring` for up to `budget` frames.
    ///
    /// When the ring runs dry before the budget is used up its interrupt is unmasked
    /// again; otherwise the ring is queued for another pass. Frames are handed to `sink`
    /// after the device lock is dropped.
    pub fn poll_rx(&self, ring: usize, budget: usize, sink: &mut dyn FrameSink) -> usize {
        let mut frames: Vec<RxFrame> = Vec::new();
        let mut work_done = 0;
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.state != NicState::Running {
                self.irq.rearm(ring);
                return 0;
            }
            let Some(rx_ring) = inner.rx.get_mut(ring) else {
                self.irq.rearm(ring);
                return 0;
            };
            let mut rx = RxPath {
                io: &self.io,
                profile: self.profile,
                pool: &mut inner.pool,
                stats: &mut inner.stats,
                dsa: self.config.dsa,
            };
            while work_done < budget {
                let work = rx.receive(rx_ring, budget - work_done, &mut frames);
                if work == 0 {
                    break;
                }
                work_done += work;
            }

            if work_done < budget {
                self.profile.unmask_rx(&self.io, ring);
                self.irq.rearm(ring);
            } else {
                self.irq.reschedule(ring);
            }
        }

        for frame in frames {
            sink.deliver_frame(frame);
        }
        work_done
    }

    /// Resynchronize the RX rings named in `rings` after a buffer runout.
    pub fn recover_rings(&self, rings: u32) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != NicState::Running {
            return 0;
        }
        let mut restamped = 0;
        for ring in inner.rx.iter_mut() {
            if rings & (1u32 << ring.index()) == 0 {
                continue;
            }
            restamped += recover_ring(
                &self.io,
                self.profile,
                &mut inner.pool,
                ring,
                &mut inner.stats,
            );
        }
        restamped
    }

    /// Decode pending notification blocks into the FDB mailbox.
    ///
    /// Returns the number of batches queued.
    pub fn drain_notifications(&self) -> usize {
        let batches = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.state != NicState::Running {
                return 0;
            }
            let Some(ring) = inner.notify.as_mut() else {
                return 0;
            };
            drain_notify_ring(&mut inner.pool, ring, &mut inner.stats)
        };

        let mut queued = 0;
        let mut dropped = 0;
        for batch in batches {
            match self.fdb.push(batch) {
                Ok(()) => queued += 1,
                Err(batch) => dropped += batch.len(),
            }
        }
        if dropped != 0 {
            warn!("[rtl83xx] FDB mailbox full, dropped {dropped} events");
            self.inner.lock().stats.fdb_dropped += dropped as u64;
        }
        queued
    }

    /// Hand queued notification batches to `sink`. Meant for a task of its own, off the
    /// interrupt and poll paths.
    pub fn dispatch_fdb_updates(&self, sink: &mut dyn FdbSink) -> usize {
        let mut batches = 0;
        while let Some(batch) = self.fdb.pop() {
            sink.fdb_update(&batch);
            batches += 1;
        }
        batches
    }

    // ==================== Upward operations ====================

    /// Queue one frame. See [`TxRequest`] for the options.
    pub fn transmit(&self, frame: &[u8], request: &TxRequest) -> NicResult {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != NicState::Running {
            return Err(NicError::BadState);
        }
        let q = pick_ring(
            self.profile.tx_queue_policy(),
            inner.tx.len(),
            request.priority,
            &self.tx_rr,
        );
        let mut tx = TxPath {
            io: &self.io,
            profile: self.profile,
            pool: &mut inner.pool,
            stats: &mut inner.stats,
            dsa: self.config.dsa,
        };
        tx.transmit(&mut inner.tx[q], frame, request)
    }

    pub fn request_transmit(
        &self,
        frame: &[u8],
        dest_port: Option<u32>,
        priority: Option<u32>,
    ) -> NicResult {
        self.transmit(
            frame,
            &TxRequest {
                dest_port,
                priority,
                vlan: None,
            },
        )
    }

    /// Program how much multicast and unknown traffic is flooded to the CPU.
    pub fn set_multicast_policy(&self, flood_all: bool, flood_multicast: bool) {
        let mut mode = RxMode::empty();
        mode.set(RxMode::PROMISC, flood_all);
        mode.set(RxMode::ALLMULTI, flood_multicast);
        let _inner = self.inner.lock();
        self.profile.set_rx_mode(&self.io, mode);
    }

    pub fn set_mac_address(&self, mac: EthernetAddress) -> NicResult {
        if !mac.is_valid() {
            return Err(NicError::AddrNotAvailable);
        }
        let _inner = self.inner.lock();
        self.profile.write_mac(&self.io, &mac.0);
        info!("[rtl83xx] MAC address set to {mac}");
        Ok(())
    }

    /// Address currently programmed into the switch.
    pub fn mac_address(&self) -> EthernetAddress {
        let _inner = self.inner.lock();
        EthernetAddress(self.profile.read_mac(&self.io))
    }

    #[cfg(test)]
    fn with_pool<R>(&self, f: impl FnOnce(&mut BufferPool<K>) -> R) -> R {
        f(&mut self.inner.lock().pool)
    }
}

impl<IO: RegisterIo, K: KernelFunc> Drop for Rtl83xxNic<IO, K> {
    fn drop(&mut self) {
        // the switch must not DMA into the pool once it is freed
        self.stop();
    }
}
