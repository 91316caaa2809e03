//! Control loop driver.
//!
//! [`ControlUnit`] owns everything one robot needs: configuration,
//! measurement table, frame router, liveness table, the subsystems present
//! in the configuration and one transmit scratch buffer per bus group.
//! Received frames and sensor snapshots are pushed in between ticks; each
//! [`ControlUnit::tick`] advances the 1 ms base clock and runs every
//! subsystem whose period divides the tick count:
//!
//! 1. gimbal, then the shooter in the same period (the shooter stops while
//!    the gimbal is in its safe mode)
//! 2. chassis, which follows the gimbal's relative yaw
//! 3. arm
//!
//! Each subsystem runs read → mode → control → encode, and its frames go
//! out through [`send_with_retry`]. A frame that cannot be delivered marks
//! the devices it addresses with a transport fault.
//!
//! [`CycleRunner`] paces ticks: `clock_nanosleep(TIMER_ABSTIME)` on
//! `CLOCK_MONOTONIC` with the `rt` feature, `Instant` + `sleep` without.

use std::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec;
use rm_common::consts::{BASE_TICK_MS, KTECH_BROADCAST_FRAME_ID};
use rm_common::control_unit::config::{DriveConfig, RobotConfig};
use rm_common::control_unit::input::{ImuSample, KeyFlags, OperatorInput, RefereeHeat, RobotInputs};
use rm_common::control_unit::measurement::DeviceId;
use rm_common::hal::bus::{BusId, BusTransport, CanFrame};
use rm_common::hal::liveness::LivenessTracker;
use thiserror::Error;
use tracing::{info, warn};

use crate::bus::send_with_retry;
use crate::codec::rm::rm_command_slot;
use crate::codec::router::{DecodeOutcome, FrameRouter, Protocol, RouteError};
use crate::codec::table::MotorTable;
use crate::kinematics::platform::PlatformAttitude;
use crate::safety::liveness::DetectTable;
use crate::state::arm::{ArmInputs, ArmMachine};
use crate::state::chassis::{ChassisInputs, ChassisMachine};
use crate::state::gimbal::{GimbalInputs, GimbalMachine};
use crate::state::shooter::{ShooterInputs, ShooterMachine};
use crate::state::{TxScratch, stage_rm_currents};
use crate::vision::frame::{FRAME_LEN, VisionMode};
use crate::vision::VisionLink;

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Bus map could not be turned into a routing table.
    #[error("routing table: {0}")]
    Route(#[from] RouteError),

    /// A base tick took longer than its period.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun { actual_ns: u64, budget_ns: u64 },
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub last_cycle_ns: u64,
    pub min_cycle_ns: u64,
    pub max_cycle_ns: u64,
    sum_cycle_ns: u128,
    pub overruns: u64,
    /// Largest gap between the scheduled and the actual wake-up.
    pub max_latency_ns: u64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. Returns true when it overran `budget_ns`.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, latency_ns: u64, budget_ns: u64) -> bool {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += u128::from(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
        let overrun = duration_ns > budget_ns;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            (self.sum_cycle_ns / u128::from(self.cycle_count)) as u64
        }
    }
}

// ─── Control Unit ───────────────────────────────────────────────────

/// Which subsystems ran in one tick and what reached the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub gimbal: bool,
    pub chassis: bool,
    pub arm: bool,
    pub frames_sent: u32,
    pub send_failures: u32,
}

// Key-edge snapshots, one per consumer, so every consumer sees each edge
// exactly once whatever its period.
const KEYS_CHASSIS: usize = 0;
const KEYS_GIMBAL: usize = 1;
const KEYS_VISION: usize = 2;

pub struct ControlUnit {
    cfg: RobotConfig,
    motors: MotorTable,
    router: FrameRouter,
    detect: DetectTable,
    chassis: Option<ChassisMachine>,
    gimbal: Option<GimbalMachine>,
    shooter: Option<ShooterMachine>,
    arm: Option<ArmMachine>,
    vision: Option<VisionLink>,
    inputs: RobotInputs,
    last_keys: [KeyFlags; 3],
    tick: u64,
    chassis_tx: TxScratch,
    gimbal_tx: TxScratch,
    arm_tx: TxScratch,
}

impl ControlUnit {
    /// Build every subsystem present in `cfg`. The configuration must
    /// already be validated.
    pub fn new(cfg: RobotConfig) -> Result<Self, CycleError> {
        let router = FrameRouter::from_config(&cfg)?;
        let can = &cfg.can;
        let gimbal = cfg.gimbal.map(|g| {
            let machine = GimbalMachine::new(g, can);
            match &cfg.vision {
                Some(v) => machine.with_vision(v),
                None => machine,
            }
        });
        let unit = Self {
            motors: MotorTable::new(),
            detect: DetectTable::new(&cfg.liveness),
            chassis: cfg.chassis.clone().map(|c| ChassisMachine::new(c, can)),
            gimbal,
            shooter: cfg.shooter.map(|s| ShooterMachine::new(s, can)),
            arm: cfg.arm.clone().map(|a| ArmMachine::new(a, can)),
            vision: cfg.vision.map(VisionLink::new),
            inputs: RobotInputs::default(),
            last_keys: [KeyFlags::empty(); 3],
            tick: 0,
            chassis_tx: TxScratch::new(),
            gimbal_tx: TxScratch::new(),
            arm_tx: TxScratch::new(),
            router,
            cfg,
        };
        info!(
            robot = %unit.cfg.name,
            routes = unit.router.routes().len(),
            chassis = unit.chassis.is_some(),
            gimbal = unit.gimbal.is_some(),
            shooter = unit.shooter.is_some(),
            arm = unit.arm.is_some(),
            vision = unit.vision.is_some(),
            "control unit ready"
        );
        Ok(unit)
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &RobotConfig {
        &self.cfg
    }

    pub fn motors(&self) -> &MotorTable {
        &self.motors
    }

    pub fn liveness(&self) -> &DetectTable {
        &self.detect
    }

    pub fn chassis(&self) -> Option<&ChassisMachine> {
        self.chassis.as_ref()
    }

    pub fn chassis_mut(&mut self) -> Option<&mut ChassisMachine> {
        self.chassis.as_mut()
    }

    pub fn gimbal(&self) -> Option<&GimbalMachine> {
        self.gimbal.as_ref()
    }

    pub fn gimbal_mut(&mut self) -> Option<&mut GimbalMachine> {
        self.gimbal.as_mut()
    }

    pub fn shooter(&self) -> Option<&ShooterMachine> {
        self.shooter.as_ref()
    }

    pub fn arm(&self) -> Option<&ArmMachine> {
        self.arm.as_ref()
    }

    pub fn arm_mut(&mut self) -> Option<&mut ArmMachine> {
        self.arm.as_mut()
    }

    pub fn vision(&self) -> Option<&VisionLink> {
        self.vision.as_ref()
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.tick * BASE_TICK_MS
    }

    // ─── Inbound ────────────────────────────────────────────────────

    /// Decode one received bus frame.
    pub fn on_can_frame(&mut self, frame: &CanFrame) -> DecodeOutcome {
        self.router
            .on_frame_received(frame, &mut self.motors, &mut self.detect)
    }

    /// Latest remote snapshot. Key edges are derived here, not by the sender.
    pub fn on_remote(&mut self, operator: OperatorInput) {
        self.inputs.operator = OperatorInput {
            last_keys: KeyFlags::empty(),
            ..operator
        };
        self.detect.notify_seen(DeviceId::RemoteControl);
    }

    pub fn on_imu(&mut self, imu: ImuSample) {
        self.inputs.imu = imu;
        self.detect.notify_seen(DeviceId::Imu);
    }

    pub fn on_referee(&mut self, heat: RefereeHeat) {
        self.inputs.heat = Some(heat);
        self.detect.notify_seen(DeviceId::Referee);
    }

    pub fn set_bullet_in_place(&mut self, in_place: bool) {
        self.inputs.bullet_in_place = in_place;
    }

    /// Suspension attitude request for a swerve base. `None` levels it.
    pub fn on_platform(&mut self, attitude: Option<PlatformAttitude>) {
        if let Some(chassis) = self.chassis.as_mut() {
            chassis.set_platform_attitude(attitude);
        }
    }

    /// Bytes received on the vision serial link.
    pub fn on_vision_bytes(&mut self, buf: &[u8]) -> usize {
        let now = self.now_ms();
        match self.vision.as_mut() {
            Some(v) => v.on_bytes(buf, now, &mut self.detect),
            None => 0,
        }
    }

    /// Hand queued vision frames to the serial writer.
    pub fn drain_vision(&mut self, send: impl FnMut(&[u8; FRAME_LEN])) {
        if let Some(v) = self.vision.as_mut() {
            v.drain_outbound(send);
        }
    }

    // ─── Scheduler ──────────────────────────────────────────────────

    /// Advance one base tick and run every subsystem that is due.
    ///
    /// `wait(ms)` is used between transmit retries on a busy bus.
    pub fn tick<T: BusTransport + ?Sized>(
        &mut self,
        bus: &mut T,
        mut wait: impl FnMut(u64),
    ) -> TickReport {
        self.tick += 1;
        let now = self.now_ms();
        self.detect.advance(now);
        if self.detect.is_faulted(DeviceId::Referee) {
            self.inputs.heat = None;
        }
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        self.run_vision(now);

        if self.due(self.cfg.periods.gimbal_ms) && self.gimbal.is_some() {
            report.gimbal = true;
            self.run_gimbal();
            let frames = core::mem::take(&mut self.gimbal_tx);
            self.send_all(bus, &frames, &mut wait, &mut report);
        }
        if self.due(self.cfg.periods.chassis_ms) && self.chassis.is_some() {
            report.chassis = true;
            self.run_chassis();
            let frames = core::mem::take(&mut self.chassis_tx);
            self.send_all(bus, &frames, &mut wait, &mut report);
        }
        if self.due(self.cfg.periods.arm_ms) && self.arm.is_some() {
            report.arm = true;
            self.run_arm();
            let frames = core::mem::take(&mut self.arm_tx);
            self.send_all(bus, &frames, &mut wait, &mut report);
        }
        report
    }

    #[inline]
    fn due(&self, period_ms: u64) -> bool {
        let every = (period_ms / BASE_TICK_MS).max(1);
        self.tick % every == 0
    }

    /// Operator snapshot as seen by one key-edge consumer.
    fn inputs_for(&mut self, consumer: usize) -> RobotInputs {
        let mut inputs = self.inputs;
        if let Some(last) = self.last_keys.get_mut(consumer) {
            inputs.operator.last_keys = *last;
            *last = inputs.operator.keys;
        }
        inputs
    }

    fn run_vision(&mut self, now: u64) {
        if self.vision.is_none() {
            return;
        }
        let inputs = self.inputs_for(KEYS_VISION);
        let faulted = self.detect.is_faulted(DeviceId::VisionLink);
        if let Some(v) = self.vision.as_mut() {
            if inputs.operator.key_rising(KeyFlags::G) {
                v.toggle_auto_aim();
            }
            v.tick(now, faulted);
        }
    }

    fn vision_command(&self, bit: VisionMode) -> Option<crate::vision::CvCommand> {
        self.vision
            .as_ref()
            .filter(|v| v.mode().contains(bit))
            .and_then(VisionLink::command)
    }

    fn run_gimbal(&mut self) {
        let inputs = self.inputs_for(KEYS_GIMBAL);
        let dt = period_s(self.cfg.periods.gimbal_ms);
        let aim = self.vision_command(VisionMode::AUTO_AIM);
        let Some(gimbal) = self.gimbal.as_mut() else {
            return;
        };
        gimbal.update(&GimbalInputs {
            robot: &inputs,
            motors: &self.motors,
            health: &self.detect,
            vision: aim,
            dt,
        });
        let gimbal_stopped = gimbal.is_safe_stopped();

        let mut commands: Vec<(u16, f64), 5> = Vec::new();
        for c in gimbal.rm_commands() {
            let _ = commands.push(c);
        }
        if let Some(shooter) = self.shooter.as_mut() {
            shooter.update(&ShooterInputs {
                robot: &inputs,
                motors: &self.motors,
                health: &self.detect,
                gimbal_stopped,
                dt,
            });
            for c in shooter.rm_commands() {
                let _ = commands.push(c);
            }
        }
        self.gimbal_tx.clear();
        stage_rm_currents(&mut self.gimbal_tx, BusId(self.cfg.can.gimbal_bus), &commands);
    }

    fn run_chassis(&mut self) {
        let inputs = self.inputs_for(KEYS_CHASSIS);
        let relative_yaw = self.gimbal.as_ref().map_or(0.0, GimbalMachine::yaw_relative);
        let vision = self.vision_command(VisionMode::AUTO_MOVE);
        let dt = period_s(self.cfg.periods.chassis_ms);
        if let Some(chassis) = self.chassis.as_mut() {
            chassis.update(&ChassisInputs {
                robot: &inputs,
                motors: &self.motors,
                health: &self.detect,
                gimbal_relative_yaw: relative_yaw,
                vision,
                dt,
            });
            self.chassis_tx.clear();
            chassis.encode(&mut self.chassis_tx);
        }
    }

    fn run_arm(&mut self) {
        let dt = period_s(self.cfg.periods.arm_ms);
        if let Some(arm) = self.arm.as_mut() {
            arm.update(&ArmInputs {
                motors: &self.motors,
                health: &self.detect,
                dt,
            });
            self.arm_tx.clear();
            arm.encode(&mut self.arm_tx);
        }
    }

    fn send_all<T: BusTransport + ?Sized>(
        &mut self,
        bus: &mut T,
        frames: &TxScratch,
        wait: &mut impl FnMut(u64),
        report: &mut TickReport,
    ) {
        for frame in frames.iter() {
            match send_with_retry(bus, frame, &self.cfg.bus_retry, &mut *wait) {
                Ok(_) => report.frames_sent += 1,
                Err(e) => {
                    report.send_failures += 1;
                    warn!(error = %e, "frame not delivered");
                    for device in self.addressed_devices(frame) {
                        self.detect.notify_transport_failure(device);
                    }
                }
            }
        }
    }

    /// Devices a transmitted frame commands.
    pub fn addressed_devices(&self, frame: &CanFrame) -> Vec<DeviceId, 8> {
        let mut out = Vec::new();
        for route in self.router.routes().iter().filter(|r| r.bus == frame.bus) {
            let hit = match route.protocol {
                Protocol::Rm => rm_command_slot(route.frame_id).is_some_and(|(id, _)| id == frame.id),
                Protocol::Mit { .. } => match route.device {
                    DeviceId::Joint(i) => self.cfg.can.mit_command_ids.get(usize::from(i)) == Some(&frame.id),
                    _ => false,
                },
                Protocol::Ktech { .. } => {
                    route.frame_id == frame.id || frame.id == KTECH_BROADCAST_FRAME_ID
                }
            };
            if hit {
                let _ = out.push(route.device);
            }
        }
        out
    }

    /// Whether the configured chassis is a swerve base.
    pub fn is_swerve(&self) -> bool {
        self.cfg
            .chassis
            .as_ref()
            .is_some_and(|c| matches!(c.drive, DriveConfig::Swerve(_)))
    }
}

#[inline]
fn period_s(period_ms: u64) -> f64 {
    period_ms as f64 / 1000.0
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Stack the control loop may touch, faulted in before the first tick.
const LOOP_STACK_BYTES: usize = 256 * 1024;

/// Prepare the calling thread to run the control loop: memory resident,
/// stack warm, pinned to `cpu_core` and scheduled `SCHED_FIFO` at
/// `rt_priority`. Without the `rt` feature only the stack is warmed.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    os::lock_memory()?;
    warm_loop_stack();
    os::pin_to_core(cpu_core)?;
    os::run_fifo(rt_priority)
}

fn warm_loop_stack() {
    let mut frame = [0u8; LOOP_STACK_BYTES];
    for byte in frame.iter_mut() {
        // SAFETY: `byte` is an exclusive reference into `frame`.
        unsafe { core::ptr::write_volatile(byte, 0xA5) };
    }
    core::hint::black_box(&frame);
}

#[cfg(feature = "rt")]
mod os {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockallFlags, mlockall};
    use nix::unistd::Pid;

    use super::CycleError;

    fn failed(step: &str, e: impl core::fmt::Display) -> CycleError {
        CycleError::RtSetup(format!("{step}: {e}"))
    }

    /// Motor table, PID state and tx scratch stay resident.
    pub fn lock_memory() -> Result<(), CycleError> {
        mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
            .map_err(|e| failed("locking control unit memory", e))
    }

    pub fn pin_to_core(cpu: usize) -> Result<(), CycleError> {
        let mut set = CpuSet::new();
        set.set(cpu)
            .map_err(|e| failed(&format!("control core {cpu}"), e))?;
        sched_setaffinity(Pid::from_raw(0), &set)
            .map_err(|e| failed(&format!("pinning control thread to core {cpu}"), e))
    }

    pub fn run_fifo(priority: i32) -> Result<(), CycleError> {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // SAFETY: `param` lives across the call and pid 0 names this thread.
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
            return Err(failed(
                &format!("control thread SCHED_FIFO priority {priority}"),
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(feature = "rt"))]
mod os {
    use super::CycleError;

    pub fn lock_memory() -> Result<(), CycleError> {
        Ok(())
    }

    pub fn pin_to_core(_cpu: usize) -> Result<(), CycleError> {
        Ok(())
    }

    pub fn run_fifo(_priority: i32) -> Result<(), CycleError> {
        Ok(())
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Paces [`ControlUnit::tick`] on the base period.
pub struct CycleRunner<T: BusTransport> {
    pub unit: ControlUnit,
    pub bus: T,
    pub stats: CycleStats,
    period_ns: u64,
}

impl<T: BusTransport> CycleRunner<T> {
    pub fn new(unit: ControlUnit, bus: T) -> Self {
        Self {
            unit,
            bus,
            stats: CycleStats::new(),
            period_ns: BASE_TICK_MS * 1_000_000,
        }
    }

    /// Run `cycles` ticks (0 = until `running` clears).
    pub fn run(&mut self, cycles: u64, running: &AtomicBool) -> Result<(), CycleError> {
        #[cfg(feature = "rt")]
        {
            self.run_rt_loop(cycles, running)
        }

        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop(cycles, running)
        }
    }

    #[inline]
    fn keep_going(&self, cycles: u64, running: &AtomicBool) -> bool {
        running.load(Ordering::Relaxed) && (cycles == 0 || self.stats.cycle_count < cycles)
    }

    /// Absolute-time pacing on `CLOCK_MONOTONIC`. An overrun ends the loop.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, cycles: u64, running: &AtomicBool) -> Result<(), CycleError> {
        use nix::sys::time::{TimeSpec, TimeValLike};
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || {
            clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("tick clock: {e}")))
        };
        let period = TimeSpec::nanoseconds(self.period_ns as i64);
        let mut wake = now()?;

        while self.keep_going(cycles, running) {
            let start = now()?;
            let latency = (start - wake).num_nanoseconds().max(0) as u64;

            self.unit.tick(&mut self.bus, |ms| {
                std::thread::sleep(std::time::Duration::from_millis(ms))
            });

            let duration = (now()? - start).num_nanoseconds().max(0) as u64;
            if self.stats.record(duration, latency, self.period_ns) {
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration,
                    budget_ns: self.period_ns,
                });
            }
            wake = wake + period;
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &wake);
        }
        Ok(())
    }

    /// Approximate pacing. Overruns are counted, not fatal.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, cycles: u64, running: &AtomicBool) -> Result<(), CycleError> {
        use std::time::{Duration, Instant};

        let period = Duration::from_nanos(self.period_ns);
        while self.keep_going(cycles, running) {
            let start = Instant::now();
            self.unit.tick(&mut self.bus, |ms| {
                std::thread::sleep(Duration::from_millis(ms))
            });
            let elapsed = start.elapsed();
            if self.stats.record(elapsed.as_nanos() as u64, 0, self.period_ns) {
                warn!(elapsed_ns = elapsed.as_nanos() as u64, "tick overran its period");
            }
            if let Some(remaining) = period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}
