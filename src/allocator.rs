/*
 * Copyright 2023 Oxide Computer Company
 */

use crate::common::*;
use crate::error::{LdevError, LdevResult};
use crate::ldev::{display_name, Block, LdevId};
use crate::module::Report;
use crate::raidcom::{Executor, LunRole, RaidcomCmd};

/**
 * The array-wide lock that serialises metadata changes between every host
 * running raidcom against the frame.
 */
#[derive(Debug, Clone)]
pub struct LockSpec {
    pub resource: String,
    pub time: u32,
}

/**
 * Everything about where and how blocks are to be allocated, fixed for the
 * whole run.
 */
#[derive(Debug, Clone)]
pub struct Target {
    pub horcm: String,
    pub pool: String,
    pub tiered: bool,
    pub chassis: Vec<String>,
    pub ports: Vec<String>,
    pub lock: LockSpec,
}

/**
 * Where the commands of a batch go.  [`Apply`] runs them against the array;
 * [`Record`] only notes what would have run, for check mode.  Queries that
 * inspect the array are not routed through here and always run.
 */
pub trait CommandSink {
    fn dispatch(
        &self,
        horcm: &str,
        cmd: &RaidcomCmd,
        report: &mut Report,
    ) -> LdevResult<()>;
}

pub struct Apply<'a> {
    log: Logger,
    exec: &'a dyn Executor,
}

impl<'a> Apply<'a> {
    pub fn new(log: &Logger, exec: &'a dyn Executor) -> Apply<'a> {
        Apply { log: log.new(o!("sink" => "apply")), exec }
    }
}

impl CommandSink for Apply<'_> {
    fn dispatch(
        &self,
        horcm: &str,
        cmd: &RaidcomCmd,
        report: &mut Report,
    ) -> LdevResult<()> {
        let output = match self.exec.execute(horcm, cmd) {
            Ok(output) => output,
            Err(e) if cmd.is_lock() => {
                error!(self.log, "could not take the array lock: {}", e);
                return Err(with_lock_holder(self.exec, horcm, e));
            }
            Err(e) => return Err(e),
        };

        report.msg(cmd.render(horcm));
        let output = output.trim();
        if !output.is_empty() {
            report.msg(output);
        }
        Ok(())
    }
}

pub struct Record {
    raidcom: String,
}

impl Record {
    pub fn new(raidcom: &str) -> Record {
        Record { raidcom: raidcom.to_string() }
    }
}

impl CommandSink for Record {
    fn dispatch(
        &self,
        horcm: &str,
        cmd: &RaidcomCmd,
        report: &mut Report,
    ) -> LdevResult<()> {
        report.msg(format!("{} {}", self.raidcom, cmd.render(horcm)));
        Ok(())
    }
}

/**
 * A failed lock is much more useful to the operator if it says who holds the
 * lock.  Ask the array, and fold the answer into the error.
 */
fn with_lock_holder(
    exec: &dyn Executor,
    horcm: &str,
    err: LdevError,
) -> LdevError {
    match err {
        LdevError::VendorCommandFailure { command, output } => {
            let holder = match exec.execute(horcm, &RaidcomCmd::GetResource) {
                Ok(o) => o.trim().to_string(),
                Err(e) => format!("unknown ({:#})", anyhow::Error::from(e)),
            };
            LdevError::LockUnavailable { command, output, holder }
        }
        other => other,
    }
}

/**
 * An ordered list of commands to run under the array lock.  The lock and
 * unlock commands are only added when the batch is taken apart for
 * execution, so a batch with no work in it never touches the lock.
 */
struct Batch {
    lock: LockSpec,
    work: Vec<RaidcomCmd>,
}

impl Batch {
    fn new(lock: &LockSpec) -> Batch {
        Batch { lock: lock.clone(), work: Vec::new() }
    }

    fn push(&mut self, cmd: RaidcomCmd) {
        self.work.push(cmd);
    }

    fn is_empty(&self) -> bool {
        self.work.is_empty()
    }

    fn into_commands(self) -> Vec<RaidcomCmd> {
        let mut out = Vec::with_capacity(self.work.len() + 2);
        out.push(RaidcomCmd::LockResource {
            resource: self.lock.resource.clone(),
            time: self.lock.time,
        });
        out.extend(self.work);
        out.push(RaidcomCmd::UnlockResource { resource: self.lock.resource });
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPort {
    pub port: String,
    pub host: String,
}

/**
 * Pull the LUN mappings out of "raidcom get ldev" output.  The interesting
 * line looks like:
 *
 *     PORTs : CL1-B-3 0 homer-pri : CL2-B-3 0 homer-sec
 *
 * i.e., colon-separated groups of port, LUN number, and host group.
 */
pub fn parse_shared_ports(output: &str) -> Vec<SharedPort> {
    let line = match output.lines().find(|l| l.starts_with("PORTs")) {
        Some(l) => l,
        None => return Vec::new(),
    };

    line.split(':')
        .skip(1)
        .filter_map(|group| {
            let t: Vec<_> = group.split_whitespace().collect();
            if t.len() < 3 {
                return None;
            }
            Some(SharedPort { port: t[0].to_string(), host: t[2].to_string() })
        })
        .collect()
}

pub struct Allocator<'a> {
    log: Logger,
    target: &'a Target,
    exec: &'a dyn Executor,
    sink: &'a dyn CommandSink,
}

impl<'a> Allocator<'a> {
    pub fn new(
        log: &Logger,
        target: &'a Target,
        exec: &'a dyn Executor,
        sink: &'a dyn CommandSink,
    ) -> Allocator<'a> {
        Allocator {
            log: log.new(o!("horcm" => target.horcm.clone())),
            target,
            exec,
            sink,
        }
    }

    fn get_ldev(&self, ldev: &LdevId) -> LdevResult<String> {
        self.exec.execute(
            &self.target.horcm,
            &RaidcomCmd::GetLdev { ldev: ldev.clone() },
        )
    }

    pub fn ldev_exists(&self, ldev: &LdevId) -> LdevResult<bool> {
        Ok(!self.get_ldev(ldev)?.contains("NOT DEFINED"))
    }

    pub fn shared_ports(&self, ldev: &LdevId) -> LdevResult<Vec<SharedPort>> {
        Ok(parse_shared_ports(&self.get_ldev(ldev)?))
    }

    /**
     * Create every LDEV in the block that does not yet exist, and give each
     * the name for its position in the block.  LDEVs that already exist keep
     * their slot in the naming sequence.
     */
    pub fn create(&self, block: &Block, report: &mut Report) -> LdevResult<()> {
        let mut batch = Batch::new(&self.target.lock);

        for (i, ldev) in block.ldevs.iter().enumerate() {
            if self.ldev_exists(ldev)? {
                info!(self.log, "LDEV exists"; "ldev" => %ldev);
                report.msg(format!("LDEV {} already exists, skipping", ldev));
                continue;
            }

            batch.push(RaidcomCmd::ResetCommandStatus);
            batch.push(RaidcomCmd::AddLdev {
                pool: self.target.pool.clone(),
                ldev: ldev.clone(),
                capacity_gb: block.capacity_gb,
            });
            batch.push(RaidcomCmd::GetCommandStatus);
            batch.push(RaidcomCmd::ModifyLdevName {
                ldev: ldev.clone(),
                name: display_name(&block.name, i + 1),
            });
            if self.target.tiered {
                batch.push(RaidcomCmd::DisableReallocation { ldev: ldev.clone() });
            }
        }

        self.run_batch(batch, report)
    }

    /**
     * Map every LDEV in the block that is not mapped anywhere yet through
     * each port to both host groups of each chassis.  An LDEV with any
     * mapping at all is left alone.
     */
    pub fn share(&self, block: &Block, report: &mut Report) -> LdevResult<()> {
        let mut batch = Batch::new(&self.target.lock);

        for ldev in &block.ldevs {
            let shared = self.shared_ports(ldev)?;
            if !shared.is_empty() {
                info!(self.log, "LDEV already shared";
                    "ldev" => %ldev, "mappings" => shared.len());
                report.msg(format!("LDEV {} is already shared, skipping", ldev));
                continue;
            }

            for port in &self.target.ports {
                for chassis in &self.target.chassis {
                    for role in [LunRole::Primary, LunRole::Secondary] {
                        batch.push(RaidcomCmd::AddLun {
                            port: port.clone(),
                            chassis: chassis.clone(),
                            role,
                            ldev: ldev.clone(),
                        });
                    }
                }
            }
        }

        self.run_batch(batch, report)
    }

    pub fn reconcile(&self, block: &Block, report: &mut Report) -> LdevResult<()> {
        info!(self.log, "reconciling block";
            "name" => &block.name, "ldevs" => block.ldevs.len());
        self.create(block, report)?;
        self.share(block, report)
    }

    fn run_batch(&self, batch: Batch, report: &mut Report) -> LdevResult<()> {
        if batch.is_empty() {
            debug!(self.log, "nothing to do; not taking the lock");
            return Ok(());
        }

        let cmds = batch.into_commands();
        info!(self.log, "running batch"; "commands" => cmds.len());

        report.msg("raidcom commands: ");
        for cmd in &cmds {
            self.sink.dispatch(&self.target.horcm, cmd, report)?;
        }
        report.set_changed();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ldev::expand_range;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    const RAIDCOM: &str = "/HORCM/usr/bin/raidcom";
    const LOCK: &str = "lock resource -resource_name meta_resource -time 60 -I5";
    const UNLOCK: &str = "unlock resource -resource_name meta_resource -I5";

    /**
     * A pretend disk array.  It remembers which LDEVs exist and how they are
     * mapped, and keeps a log of every command it was asked to run.
     */
    struct FakeArray {
        ldevs: RefCell<BTreeMap<LdevId, Vec<SharedPort>>>,
        commands: RefCell<Vec<String>>,
        locked_by: Option<String>,
        fail: Option<String>,
    }

    impl FakeArray {
        fn new() -> FakeArray {
            FakeArray {
                ldevs: RefCell::new(BTreeMap::new()),
                commands: RefCell::new(Vec::new()),
                locked_by: None,
                fail: None,
            }
        }

        fn with_ldev(self, id: &str) -> FakeArray {
            self.ldevs.borrow_mut().insert(ldev(id), Vec::new());
            self
        }

        fn with_share(self, id: &str, port: &str, host: &str) -> FakeArray {
            self.ldevs.borrow_mut().entry(ldev(id)).or_default().push(
                SharedPort { port: port.to_string(), host: host.to_string() },
            );
            self
        }

        fn commands(&self) -> Vec<String> {
            self.commands.borrow().clone()
        }

        /**
         * Only the commands that change something, i.e., not "get ldev".
         */
        fn mutations(&self) -> Vec<String> {
            self.commands()
                .into_iter()
                .filter(|c| !c.starts_with("get ldev"))
                .collect()
        }

        fn clear_log(&self) {
            self.commands.borrow_mut().clear();
        }
    }

    impl Executor for FakeArray {
        fn execute(&self, horcm: &str, cmd: &RaidcomCmd) -> LdevResult<String> {
            let text = cmd.render(horcm);
            self.commands.borrow_mut().push(text.clone());

            let refuse = match (&self.locked_by, &self.fail) {
                (Some(_), _) if cmd.is_lock() => true,
                (_, Some(f)) => &text == f,
                _ => false,
            };
            if refuse {
                return Err(LdevError::VendorCommandFailure {
                    command: format!("{} {}", RAIDCOM, text),
                    output: "exit code 1: raidcom: [EX_CMDRJE] rejected"
                        .to_string(),
                });
            }

            let mut ldevs = self.ldevs.borrow_mut();
            match cmd {
                RaidcomCmd::GetLdev { ldev } => Ok(match ldevs.get(ldev) {
                    None => format!(
                        "Serial#  : 64015\nLDEV : {}\nVOL_TYPE : NOT DEFINED\n",
                        ldev
                    ),
                    Some(shares) => {
                        let mut out = format!(
                            "Serial#  : 64015\nLDEV : {}\n\
                            VOL_TYPE : OPEN-V-CVS\nNUM_PORT : {}\n",
                            ldev,
                            shares.len()
                        );
                        if !shares.is_empty() {
                            out.push_str("PORTs");
                            for s in shares {
                                out.push_str(&format!(
                                    " : {}-0 0 {}",
                                    s.port, s.host
                                ));
                            }
                            out.push('\n');
                        }
                        out
                    }
                }),
                RaidcomCmd::AddLdev { ldev, .. } => {
                    ldevs.insert(ldev.clone(), Vec::new());
                    Ok(String::new())
                }
                RaidcomCmd::AddLun { port, chassis, role, ldev } => {
                    let host = format!(
                        "{}-{}",
                        chassis,
                        if *role == LunRole::Primary { "pri" } else { "sec" }
                    );
                    ldevs
                        .entry(ldev.clone())
                        .or_default()
                        .push(SharedPort { port: port.clone(), host });
                    Ok(String::new())
                }
                RaidcomCmd::GetResource => Ok(format!(
                    "RS_GROUP  RGID  stat  Lock_owner  Lock_host  Serial#\n\
                    meta_resource  0  Locked  {}  -  64015\n",
                    self.locked_by.as_deref().unwrap_or("-")
                )),
                RaidcomCmd::GetCommandStatus => {
                    Ok("HANDLE   SSB1    SSB2    ERR_CNT   Serial#   Description\n\
                        00c3        -       -          0     64015   -\n"
                        .to_string())
                }
                _ => Ok(String::new()),
            }
        }
    }

    fn ldev(s: &str) -> LdevId {
        let (cu, idx) = s.split_once(':').unwrap();
        LdevId::new(cu, u8::from_str_radix(idx, 16).unwrap())
    }

    fn target(pool: &str, tiered: bool) -> Target {
        Target {
            horcm: "5".to_string(),
            pool: pool.to_string(),
            tiered,
            chassis: vec!["homer".to_string(), "blinky".to_string()],
            ports: vec!["CL1-B".to_string(), "CL2-B".to_string()],
            lock: LockSpec { resource: "meta_resource".to_string(), time: 60 },
        }
    }

    fn block(begin: &str, end: &str) -> Result<Block> {
        Ok(Block {
            name: "BIGDUMBDISKGROUP".to_string(),
            capacity_gb: 100,
            ldevs: expand_range(begin, end)?,
        })
    }

    fn create_seq(id: &str, n: &str) -> Vec<String> {
        vec![
            "reset command_status -I5".to_string(),
            format!("add ldev -pool 14 -ldev_id {} -capacity 100g -I5", id),
            "get command_status -I5".to_string(),
            format!(
                "modify ldev -ldev_id {} -ldev_name BIGDUMBDISKGROUP_{} -I5",
                id, n
            ),
        ]
    }

    #[test]
    fn create_whole_block() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new();
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.create(&block("15:60", "15:62")?, &mut report)?;
        assert!(report.changed());

        let mut expected = vec![LOCK.to_string()];
        expected.extend(create_seq("15:60", "01"));
        expected.extend(create_seq("15:61", "02"));
        expected.extend(create_seq("15:62", "03"));
        expected.push(UNLOCK.to_string());
        assert_eq!(array.mutations(), expected);

        /*
         * All of the existence checks happen before the lock is taken:
         */
        let all = array.commands();
        assert_eq!(&all[..3], &[
            "get ldev -ldev_id 15:60 -I5",
            "get ldev -ldev_id 15:61 -I5",
            "get ldev -ldev_id 15:62 -I5",
        ]);
        assert_eq!(all[3], LOCK);

        assert_eq!(report.messages()[0], "raidcom commands: ");
        assert_eq!(report.messages()[1], LOCK);
        assert!(report
            .messages()
            .iter()
            .any(|m| m.starts_with("HANDLE")));
        Ok(())
    }

    #[test]
    fn create_keeps_naming_slots_of_existing() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new().with_ldev("15:61");
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.create(&block("15:60", "15:62")?, &mut report)?;
        assert!(report.changed());

        let mut expected = vec![LOCK.to_string()];
        expected.extend(create_seq("15:60", "01"));
        expected.extend(create_seq("15:62", "03"));
        expected.push(UNLOCK.to_string());
        assert_eq!(array.mutations(), expected);

        assert_eq!(
            report.messages()[0],
            "LDEV 15:61 already exists, skipping"
        );
        Ok(())
    }

    #[test]
    fn create_twice_changes_nothing() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new();
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);
        let b = block("15:60", "15:6f")?;

        let mut first = Report::new(false);
        a.create(&b, &mut first)?;
        assert!(first.changed());

        array.clear_log();
        let mut second = Report::new(false);
        a.create(&b, &mut second)?;
        assert!(!second.changed());
        assert_eq!(second.messages().len(), 16);
        assert!(second
            .messages()
            .iter()
            .all(|m| m.ends_with("already exists, skipping")));

        /*
         * Nothing to do means no lock:
         */
        assert!(array.mutations().is_empty());
        Ok(())
    }

    #[test]
    fn nothing_to_create_takes_no_lock() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new().with_ldev("15:60").with_ldev("15:61");
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.create(&block("15:60", "15:61")?, &mut report)?;
        assert!(!report.changed());
        assert!(!array.commands().iter().any(|c| c.contains("lock")));
        assert_eq!(array.commands().len(), 2);
        Ok(())
    }

    #[test]
    fn tiered_pool_disables_reallocation() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new();
        let t = target("15", true);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.create(&block("15:60", "15:61")?, &mut report)?;

        let m = array.mutations();
        assert_eq!(m.len(), 2 + 2 * 5);
        assert_eq!(
            m[5],
            "modify ldev -ldev_id 15:60 -status enable_reallocation 5 -I5"
        );
        assert_eq!(
            m[10],
            "modify ldev -ldev_id 15:61 -status enable_reallocation 5 -I5"
        );
        Ok(())
    }

    #[test]
    fn untiered_pool_leaves_reallocation_alone() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new();
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.create(&block("15:60", "15:61")?, &mut report)?;
        assert!(!array
            .commands()
            .iter()
            .any(|c| c.contains("enable_reallocation")));
        Ok(())
    }

    #[test]
    fn share_unshared_block() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new().with_ldev("15:60");
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.share(&block("15:60", "15:60")?, &mut report)?;
        assert!(report.changed());

        assert_eq!(array.mutations(), vec![
            LOCK,
            "add lun -port CL1-B homer-pri -ldev_id 15:60 -I5",
            "add lun -port CL1-B homer-sec -ldev_id 15:60 -I5",
            "add lun -port CL1-B blinky-pri -ldev_id 15:60 -I5",
            "add lun -port CL1-B blinky-sec -ldev_id 15:60 -I5",
            "add lun -port CL2-B homer-pri -ldev_id 15:60 -I5",
            "add lun -port CL2-B homer-sec -ldev_id 15:60 -I5",
            "add lun -port CL2-B blinky-pri -ldev_id 15:60 -I5",
            "add lun -port CL2-B blinky-sec -ldev_id 15:60 -I5",
            UNLOCK,
        ]);
        Ok(())
    }

    #[test]
    fn share_twice_changes_nothing() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new().with_ldev("15:60").with_ldev("15:61");
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);
        let b = block("15:60", "15:61")?;

        let mut first = Report::new(false);
        a.share(&b, &mut first)?;
        assert!(first.changed());

        array.clear_log();
        let mut second = Report::new(false);
        a.share(&b, &mut second)?;
        assert!(!second.changed());
        assert_eq!(second.messages(), &[
            "LDEV 15:60 is already shared, skipping",
            "LDEV 15:61 is already shared, skipping",
        ]);
        assert!(array.mutations().is_empty());
        Ok(())
    }

    #[test]
    fn share_skips_partially_shared() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new()
            .with_ldev("15:60")
            .with_share("15:61", "CL7-F", "marge-pri");
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        a.share(&block("15:60", "15:61")?, &mut report)?;
        assert!(report.changed());

        let m = array.mutations();
        assert_eq!(m.len(), 2 + 8);
        assert!(m.iter().all(|c| !c.contains("15:61")));
        assert_eq!(
            report.messages()[0],
            "LDEV 15:61 is already shared, skipping"
        );
        Ok(())
    }

    #[test]
    fn reconcile_creates_then_shares() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new();
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);
        let b = block("15:60", "15:61")?;

        let mut report = Report::new(false);
        a.reconcile(&b, &mut report)?;
        assert!(report.changed());

        let m = array.mutations();
        assert_eq!(m.iter().filter(|c| c.as_str() == LOCK).count(), 2);
        assert_eq!(m.len(), (2 + 8) + (2 + 16));

        array.clear_log();
        let mut again = Report::new(false);
        a.reconcile(&b, &mut again)?;
        assert!(!again.changed());
        assert!(array.mutations().is_empty());
        Ok(())
    }

    #[test]
    fn lock_failure_names_the_holder() -> Result<()> {
        let log = test_log();
        let mut array = FakeArray::new();
        array.locked_by = Some("maint-host".to_string());
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        match a.create(&block("15:60", "15:61")?, &mut report) {
            Err(LdevError::LockUnavailable { command, output, holder }) => {
                assert_eq!(command, format!("{} {}", RAIDCOM, LOCK));
                assert!(output.contains("EX_CMDRJE"));
                assert!(holder.contains("maint-host"));
            }
            other => panic!("unexpected {:?}", other),
        }

        /*
         * After the failed lock we ask who holds it, and then stop.
         */
        let m = array.mutations();
        assert_eq!(m, vec![LOCK, "get resource -I5"]);
        assert!(!report.changed());
        Ok(())
    }

    #[test]
    fn command_failure_aborts_batch() -> Result<()> {
        let log = test_log();
        let mut array = FakeArray::new();
        array.fail =
            Some("add ldev -pool 14 -ldev_id 15:61 -capacity 100g -I5".into());
        let t = target("14", false);
        let sink = Apply::new(&log, &array);
        let a = Allocator::new(&log, &t, &array, &sink);

        let mut report = Report::new(false);
        match a.create(&block("15:60", "15:62")?, &mut report) {
            Err(LdevError::VendorCommandFailure { command, output }) => {
                assert!(command.ends_with("-ldev_id 15:61 -capacity 100g -I5"));
                assert!(output.contains("rejected"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let m = array.mutations();
        assert_eq!(m.last().unwrap(), array.fail.as_ref().unwrap());
        assert!(!m.iter().any(|c| c == UNLOCK));
        assert!(!m.iter().any(|c| c.contains("get resource")));

        /*
         * The LDEV created before the failure stays created:
         */
        assert!(array.ldevs.borrow().contains_key(&ldev("15:60")));
        Ok(())
    }

    #[test]
    fn check_mode_only_records() -> Result<()> {
        let log = test_log();
        let array = FakeArray::new().with_ldev("15:61");
        let t = target("14", false);
        let sink = Record::new(RAIDCOM);
        let a = Allocator::new(&log, &t, &array, &sink);
        let b = block("15:60", "15:62")?;

        let mut report = Report::new(true);
        a.reconcile(&b, &mut report)?;
        assert!(report.changed());

        /*
         * Only queries reached the array:
         */
        assert!(array.mutations().is_empty());
        assert_eq!(array.commands().len(), 6);

        let msgs = report.messages();
        assert_eq!(msgs[0], crate::module::CHECK_MODE_BANNER);
        assert_eq!(msgs[1], "LDEV 15:61 already exists, skipping");
        assert_eq!(msgs[2], "raidcom commands: ");
        assert_eq!(msgs[3], format!("{} {}", RAIDCOM, LOCK));
        assert!(msgs.contains(&format!(
            "{} modify ldev -ldev_id 15:62 -ldev_name BIGDUMBDISKGROUP_03 -I5",
            RAIDCOM
        )));
        assert!(msgs.contains(&format!(
            "{} add lun -port CL2-B blinky-sec -ldev_id 15:62 -I5",
            RAIDCOM
        )));
        Ok(())
    }

    #[test]
    fn parse_ports_line() {
        let out = "LDEV : 5472\nNUM_PORT : 2\n\
            PORTs : CL1-B-3 0 homer-pri : CL2-B-3 0 homer-sec\n\
            F_POOLID : NONE\n";
        assert_eq!(parse_shared_ports(out), vec![
            SharedPort { port: "CL1-B-3".into(), host: "homer-pri".into() },
            SharedPort { port: "CL2-B-3".into(), host: "homer-sec".into() },
        ]);

        let one = "PORTs : CL7-F-0 4 marge-pri\n";
        assert_eq!(parse_shared_ports(one).len(), 1);
    }

    #[test]
    fn parse_ports_unshared() {
        assert!(parse_shared_ports("LDEV : 5472\nNUM_PORT : 0\n").is_empty());
        assert!(parse_shared_ports("NUM_PORT : 0\nPORTs : \n").is_empty());
        assert!(parse_shared_ports("").is_empty());
    }
}
