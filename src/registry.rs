//! The registry: every module's descriptors, the class-id machinery, and
//! the trace-destination table, all behind one lock. Mirrors the
//! "one big table, one big lock, add/remove by name" shape of a kernel
//! scheme list more than a fine-grained lock-per-module design, since
//! query execution routinely walks every module anyway.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::RwLock;

use crate::descriptor::{ClassId, DescriptorBuilder, FastBranch, Flags};
use crate::error::{Error, Result};
use crate::intern::Sym;
use crate::matcher;
use crate::query::{Query, TraceCmd};
use crate::table::ModuleTable;
use crate::wildcard;

#[cfg(feature = "classes")]
use crate::classmap::{self, ClassMap, ClassUser};
#[cfg(feature = "classes")]
use crate::classparam::{self, ClassParameter};
#[cfg(feature = "trace")]
use crate::trace::TraceTable;

use alloc::sync::Arc;

/// One descriptor's static description, as supplied by the host at
/// module-registration time (everything but the mutable flags/trace
/// destination, which start at their defaults).
pub struct SiteSpec {
    pub function: String,
    pub filename: String,
    pub format: String,
    pub lineno: u32,
    pub class_id: ClassId,
    pub default_flags: Flags,
}

struct State {
    modules: Vec<ModuleTable>,
    source_prefix: Option<String>,
    #[cfg(feature = "classes")]
    classmaps: Vec<ClassMap>,
    #[cfg(feature = "classes")]
    class_users: Vec<ClassUser>,
    #[cfg(feature = "classes")]
    class_params: Vec<ClassParameter>,
    #[cfg(feature = "trace")]
    trace_table: TraceTable,
}

/// The top-level handle a host keeps for the life of the process (or for
/// as long as dynamic debug is wired up). Cheap to construct; all state
/// lives behind the internal lock.
pub struct Registry {
    state: RwLock<State>,
    verbose: AtomicU8,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            state: RwLock::new(State {
                modules: Vec::new(),
                source_prefix: None,
                #[cfg(feature = "classes")]
                classmaps: Vec::new(),
                #[cfg(feature = "classes")]
                class_users: Vec::new(),
                #[cfg(feature = "classes")]
                class_params: Vec::new(),
                #[cfg(feature = "trace")]
                trace_table: TraceTable::new(),
            }),
            verbose: AtomicU8::new(0),
        }
    }

    /// Tiered diagnostic level (0 disables the crate's own `log::trace!`
    /// chatter, 4 is maximally verbose). Independent of the host's own
    /// `log` filter configuration.
    pub fn set_verbose(&self, level: u8) {
        self.verbose.store(level.min(4), Ordering::Relaxed);
    }

    pub fn verbose(&self) -> u8 {
        self.verbose.load(Ordering::Relaxed)
    }

    /// The source-tree prefix `file` queries may strip off a
    /// descriptor's filename before matching (e.g. a build-root path),
    /// alongside the plain and basename forms.
    pub fn set_source_prefix(&self, prefix: impl Into<String>) {
        self.state.write().source_prefix = Some(prefix.into());
    }

    pub fn source_prefix(&self) -> Option<String> {
        self.state.read().source_prefix.clone()
    }

    /// Register a module's descriptors in one shot. Returns the
    /// fast-branch handle for each site, in the same order as `sites`,
    /// for the host to stash next to its inline call-site checks. Also
    /// synchronizes any class-parameter binding already registered
    /// against one of this module's class maps, applying its last
    /// written value to the freshly-built descriptors.
    pub fn add_module(&self, modname: &str, sites: Vec<SiteSpec>) -> Vec<Arc<FastBranch>> {
        let sym = Sym::intern(modname);
        let mut keys = Vec::with_capacity(sites.len());
        let mut descriptors = Vec::with_capacity(sites.len());
        for site in sites {
            let (d, key) = DescriptorBuilder::new(
                modname,
                site.function,
                site.filename,
                site.format,
                site.lineno,
            )
            .class_id(site.class_id)
            .default_flags(site.default_flags)
            .build();
            descriptors.push(d);
            keys.push(key);
        }
        {
            let mut state = self.state.write();
            state.modules.push(ModuleTable::new(sym, descriptors));
        }
        #[cfg(feature = "classes")]
        self.sync_class_params_for(sym);
        keys
    }

    /// Drop every descriptor belonging to `modname`. Bindings in
    /// [`crate::classparam`] are resolved by name on every write, so no
    /// explicit invalidation step is needed here. Any trace destinations
    /// the removed descriptors held are released.
    pub fn remove_module(&self, modname: &str) -> Result<()> {
        let sym = Sym::intern(modname);
        let mut state = self.state.write();
        let before = state.modules.len();
        #[cfg(feature = "trace")]
        {
            if let Some(table) = state.modules.iter().find(|m| m.modname() == sym) {
                let dsts: Vec<u8> = table.iter().map(|d| d.trace_dst).collect();
                for dst in dsts {
                    state.trace_table.dec_use(dst);
                }
            }
        }
        state.modules.retain(|m| m.modname() != sym);
        if state.modules.len() == before {
            return Err(Error::not_found());
        }
        Ok(())
    }

    /// Re-apply every class parameter bound to one of `modname`'s class
    /// maps, so a freshly (re)loaded module starts in sync with
    /// whatever value the host already set on the parameter.
    #[cfg(feature = "classes")]
    fn sync_class_params_for(&self, modname: Sym) {
        let pending: Vec<(Sym, Sym, u64)> = {
            let state = self.state.read();
            state
                .class_params
                .iter()
                .filter(|p| p.module() == modname)
                .map(|p| (p.module(), p.map_name(), p.value()))
                .collect()
        };
        for (module, map_name, value) in pending {
            let value_str = value.to_string();
            let _ = self.apply_class_value(module, map_name, self.flags_for(module, map_name), &value_str);
        }
    }

    #[cfg(feature = "classes")]
    fn flags_for(&self, module: Sym, map_name: Sym) -> Flags {
        self.state
            .read()
            .class_params
            .iter()
            .find(|p| p.module() == module && p.map_name() == map_name)
            .map(|p| p.flags)
            .unwrap_or(Flags::PRINT)
    }

    /// Parse and execute one query line, applying its flag modifiers to
    /// every matching descriptor across every module. Returns the number
    /// of descriptors that matched (whether or not the match changed
    /// anything). `open`/`close` trace-instance commands return 0 on
    /// success.
    pub fn exec_query(&self, line: &str) -> Result<usize> {
        self.exec_query_inner(line, None)
    }

    /// Like [`Self::exec_query`], but the query is forced to apply only
    /// to `modname` regardless of (or absence of) a `module` term in
    /// `line`. Used for per-module boot/command-line parameters, which
    /// name their target module out of band.
    #[cfg(feature = "boot-params")]
    pub fn exec_query_for_module(&self, modname: &str, line: &str) -> Result<usize> {
        self.exec_query_inner(line, Some(modname))
    }

    fn exec_query_inner(&self, line: &str, force_module: Option<&str>) -> Result<usize> {
        let mut query = Query::parse(line)?;
        if let Some(m) = force_module {
            query.module = Some(String::from(m));
        }

        #[cfg(feature = "trace")]
        if let Some(cmd) = &query.trace_cmd {
            let mut state = self.state.write();
            match cmd {
                TraceCmd::Open(name) => {
                    state.trace_table.open(name)?;
                }
                TraceCmd::Close(name) => {
                    state.trace_table.close(name)?;
                }
            }
            return Ok(0);
        }
        #[cfg(not(feature = "trace"))]
        if query.trace_cmd.is_some() {
            return Err(Error::invalid());
        }

        let mut state = self.state.write();

        #[cfg(feature = "trace")]
        let explicit_dst: Option<u8> = match &query.trace_dst_name {
            Some(name) => Some(state.trace_table.find(name).ok_or_else(Error::not_found)?),
            None => None,
        };
        #[cfg(feature = "trace")]
        let default_dst = state.trace_table.default_dst();
        #[cfg(not(feature = "trace"))]
        let explicit_dst: Option<u8> = None;
        #[cfg(not(feature = "trace"))]
        let default_dst: u8 = 0;

        let mut matched = 0usize;
        let state = &mut *state;

        for table in state.modules.iter_mut() {
            let modname_sym = table.modname();
            let modname = modname_sym.as_str();
            if let Some(m) = &query.module {
                if !wildcard::glob_match(m, &modname) {
                    continue;
                }
            }

            #[cfg(feature = "classes")]
            let resolved_class: Option<ClassId> = match &query.class {
                Some(name) => {
                    match classmap::resolve(&state.classmaps, &state.class_users, modname_sym, name) {
                        Some((_, id)) => Some(ClassId::Id(id)),
                        None => continue, // unknown class in this table: 0 matches, not an error
                    }
                }
                None => None,
            };
            #[cfg(not(feature = "classes"))]
            let resolved_class: Option<ClassId> = None;

            // Bitmask of raw class ids that fall inside a map owned by
            // this module *and* have a class parameter bound to that
            // specific map — protection is scoped per map, not per
            // module, so a module's other, unbound maps stay reachable
            // by class-less queries.
            #[cfg(feature = "classes")]
            let protected_classes: u64 = state
                .classmaps
                .iter()
                .filter(|m| m.owning_module() == modname_sym)
                .filter(|m| {
                    state
                        .class_params
                        .iter()
                        .any(|p| p.module() == modname_sym && p.map_name() == m.name())
                })
                .fold(0u64, |mask, m| {
                    (0..m.length()).fold(mask, |mask, i| mask | (1u64 << (m.base + i)))
                });
            #[cfg(not(feature = "classes"))]
            let protected_classes: u64 = 0;

            for d in table.iter_mut() {
                if !matcher::is_match(
                    &query,
                    d,
                    resolved_class,
                    protected_classes,
                    state.source_prefix.as_deref(),
                ) {
                    continue;
                }
                matched += 1;
                let applied = matcher::apply(&query, explicit_dst, default_dst, d);
                if applied.enabled_changed {
                    d.fast_branch().set(d.flags.is_enabled());
                }
                #[cfg(feature = "trace")]
                if applied.old_dst != applied.new_dst {
                    state.trace_table.dec_use(applied.old_dst);
                    state.trace_table.inc_use(applied.new_dst);
                }
            }
        }
        Ok(matched)
    }

    /// Execute a batch of subcommands, one per line, continuing to the
    /// next line if one fails. Returns the total matched-descriptor count
    /// across all lines and the first error encountered, if any.
    pub fn exec_queries(&self, text: &str) -> (usize, Option<Error>) {
        let mut total = 0usize;
        let mut first_err = None;
        for raw in text.split(['\n', ';', '%']) {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.exec_query(line) {
                Ok(n) => total += n,
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        (total, first_err)
    }

    /// Produce one `describe()` line per descriptor currently registered,
    /// for a control-surface "read everything" response.
    pub fn describe_all(&self) -> Vec<String> {
        let state = self.state.read();
        let mut out = Vec::new();
        for table in state.modules.iter() {
            let modname_sym = table.modname();
            let modname = modname_sym.as_str();
            for d in table.iter() {
                #[cfg(feature = "classes")]
                let class_name = class_name_for(&state.classmaps, &state.class_users, modname_sym, d.class_id);
                #[cfg(not(feature = "classes"))]
                let class_name: Option<String> = None;
                #[cfg(feature = "trace")]
                let trace_name = state.trace_table.name_of(d.trace_dst);
                #[cfg(not(feature = "trace"))]
                let trace_name: Option<String> = None;
                out.push(matcher::describe(
                    d,
                    &modname,
                    class_name.as_deref(),
                    trace_name.as_deref(),
                ));
            }
        }
        out
    }

    /// `(default_dst_name, open_instance_names)`, for the control
    /// surface's read trailer.
    #[cfg(feature = "trace")]
    pub fn trace_summary(&self) -> (Option<String>, Vec<String>) {
        let state = self.state.read();
        let default = state.trace_table.default_dst();
        (
            state.trace_table.name_of(default),
            state.trace_table.open_names(),
        )
    }

    pub fn module_count(&self) -> usize {
        self.state.read().modules.len()
    }

    /// Register a class map, rejecting it (without mutating anything
    /// else) if it overlaps another map already owned by the same
    /// module — the "class-range overlap" failure is a rollback of this
    /// one registration, not a partial mutation to undo.
    #[cfg(feature = "classes")]
    pub fn define_classmap(&self, map: ClassMap) -> Result<()> {
        let mut state = self.state.write();
        classmap::check_no_overlap(&state.classmaps, &map)?;
        state.classmaps.push(map);
        Ok(())
    }

    #[cfg(feature = "classes")]
    pub fn use_classmap(&self, module: &str, map_name: &str) {
        let user = ClassUser::new(Sym::intern(module), Sym::intern(map_name));
        self.state.write().class_users.push(user);
    }

    /// Bind a class parameter, then immediately synchronize it (an
    /// empty value is a no-op sync, just establishing the binding).
    #[cfg(feature = "classes")]
    pub fn bind_class_parameter(&self, param: ClassParameter) {
        self.state.write().class_params.push(param);
    }

    /// Write a class-parameter value, fanning the resulting enabled/
    /// disabled decision out to every descriptor in the bound module
    /// whose class falls inside the bound map, via the ordinary
    /// `class <name> (+|-)<flags>` exec path (so fast-branch toggling,
    /// trace-destination bookkeeping, and match counting all go through
    /// the one code path a textual query would). Returns the summed
    /// match count across every class in the map.
    #[cfg(feature = "classes")]
    pub fn write_class_parameter(&self, name: &str, value: &str) -> Result<usize> {
        let name_sym = Sym::intern(name);
        let (module, map_name, flags) = {
            let state = self.state.read();
            let param = state
                .class_params
                .iter()
                .find(|p| p.name == name_sym)
                .ok_or_else(Error::not_found)?;
            (param.module(), param.map_name(), param.flags)
        };
        let matched = self.apply_class_value(module, map_name, flags, value)?;
        let raw: u64 = value.trim().parse().unwrap_or(0);
        let mut state = self.state.write();
        if let Some(param) = state.class_params.iter_mut().find(|p| p.name == name_sym) {
            param.value = raw;
        }
        Ok(matched)
    }

    #[cfg(feature = "classes")]
    fn apply_class_value(&self, module: Sym, map_name: Sym, flags: Flags, value: &str) -> Result<usize> {
        let (desired, map_sym_name) = {
            let state = self.state.read();
            let map = state
                .classmaps
                .iter()
                .find(|m| m.name() == map_name)
                .ok_or_else(Error::not_found)?;
            (classparam::desired_state(map, value)?, map.name())
        };
        let letters = flag_letters(flags);
        let module_name = module.as_str();
        let mut total = 0usize;
        for (i, on) in desired.iter().enumerate() {
            let class_name = {
                let state = self.state.read();
                let map = state
                    .classmaps
                    .iter()
                    .find(|m| m.name() == map_sym_name)
                    .ok_or_else(Error::not_found)?;
                map.name_of(map.base + i as u8).map(alloc::string::ToString::to_string)
            };
            let Some(class_name) = class_name else {
                continue;
            };
            let op = if *on { '+' } else { '-' };
            let synthesized = alloc::format!("class {class_name} {op}{letters}");
            total += self.exec_query_for_module_unchecked(&module_name, &synthesized)?;
        }
        Ok(total)
    }

    /// Like [`Self::exec_query_for_module`], but available regardless of
    /// the `boot-params` feature (class-parameter fan-out needs module
    /// scoping even when boot-parameter ingestion is compiled out).
    #[cfg(feature = "classes")]
    fn exec_query_for_module_unchecked(&self, modname: &str, line: &str) -> Result<usize> {
        self.exec_query_inner(line, Some(modname))
    }

    #[cfg(feature = "trace")]
    pub fn trace_open(&self, name: &str) -> Result<u8> {
        self.state.write().trace_table.open(name)
    }

    #[cfg(feature = "trace")]
    pub fn trace_close(&self, name: &str) -> Result<()> {
        self.state.write().trace_table.close(name)
    }

    #[cfg(feature = "trace")]
    pub fn trace_name(&self, dst: u8) -> Option<String> {
        self.state.read().trace_table.name_of(dst)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "classes")]
fn class_name_for(
    classmaps: &[ClassMap],
    class_users: &[ClassUser],
    modname: Sym,
    class_id: ClassId,
) -> Option<String> {
    let id = match class_id {
        ClassId::Default => return None,
        ClassId::Id(id) => id,
    };
    for m in classmaps.iter().filter(|m| m.owning_module() == modname) {
        if let Some(name) = m.name_of(id) {
            return Some(String::from(name));
        }
    }
    let user = class_users.iter().find(|u| u.module() == modname)?;
    let map = classmaps.iter().find(|m| m.name() == user.map_name())?;
    map.name_of(id).map(String::from)
}

#[cfg(feature = "classes")]
fn flag_letters(flags: Flags) -> String {
    const SLOTS: &[(char, Flags)] = &[
        ('p', Flags::PRINT),
        ('T', Flags::TRACE),
        ('m', Flags::INCL_MODNAME),
        ('f', Flags::INCL_FUNCNAME),
        ('s', Flags::INCL_SOURCENAME),
        ('l', Flags::INCL_LINENO),
        ('t', Flags::INCL_TID),
    ];
    let mut out = String::new();
    for (letter, bit) in SLOTS {
        if flags.contains(*bit) {
            out.push(*letter);
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(func: &str, file: &str, fmt: &str, line: u32) -> SiteSpec {
        SiteSpec {
            function: func.into(),
            filename: file.into(),
            format: fmt.into(),
            lineno: line,
            class_id: ClassId::Default,
            default_flags: Flags::empty(),
        }
    }

    #[test]
    fn add_then_query_then_remove() {
        let reg = Registry::new();
        let keys = reg.add_module(
            "usb_core",
            alloc::vec![site("probe", "core.c", "probing", 10)],
        );
        assert_eq!(keys.len(), 1);
        assert!(!keys[0].is_enabled());

        let matched = reg.exec_query("module usb_core +p").unwrap();
        assert_eq!(matched, 1);
        assert!(keys[0].is_enabled());

        reg.remove_module("usb_core").unwrap();
        assert_eq!(reg.module_count(), 0);
        assert!(reg.remove_module("usb_core").is_err());
    }

    #[test]
    fn exec_queries_continues_past_bad_line() {
        let reg = Registry::new();
        reg.add_module("usb_core", alloc::vec![site("probe", "core.c", "x", 1)]);
        let (matched, err) = reg.exec_queries("bogus 1 +p\nmodule usb_core +p");
        assert_eq!(matched, 1);
        assert!(err.is_some());
    }

    #[test]
    fn exec_queries_ignores_comments_and_blank_lines() {
        let reg = Registry::new();
        reg.add_module("usb_core", alloc::vec![site("probe", "core.c", "x", 1)]);
        let (matched, err) = reg.exec_queries("# comment\n\nmodule usb_core +p");
        assert_eq!(matched, 1);
        assert!(err.is_none());
    }

    #[test]
    fn scenario_s1_function_targeted_flags() {
        let reg = Registry::new();
        reg.add_module(
            "m1",
            alloc::vec![
                site("do_a", "a.c", "alpha %d", 10),
                site("do_b", "a.c", "beta", 20),
                site("do_b", "a.c", "beta-2", 21),
            ],
        );
        assert_eq!(reg.exec_query("module m1 func do_a +p").unwrap(), 1);
        assert_eq!(reg.exec_query("module m1 func do_b -p").unwrap(), 2);
    }

    #[test]
    fn scenario_s4_format_anchor() {
        let reg = Registry::new();
        reg.add_module(
            "m1",
            alloc::vec![
                site("a", "a.c", "hi: %d", 1),
                site("b", "a.c", "mid: %d", 2),
                site("c", "a.c", "low: %d", 3),
                site("d", "a.c", "low:lower: %d", 4),
            ],
        );
        assert_eq!(reg.exec_query(r"format ^low: +T").unwrap(), 2);
        assert_eq!(reg.exec_query(r"format ^low:\040 +T").unwrap(), 1);
    }

    #[cfg(feature = "classes")]
    #[test]
    fn class_parameter_write_fans_out() {
        use crate::classmap::MapType;

        let reg = Registry::new();
        reg.add_module(
            "net_core_cp",
            alloc::vec![
                SiteSpec {
                    class_id: ClassId::Id(0),
                    ..site("rx", "net.c", "rx", 1)
                },
                SiteSpec {
                    class_id: ClassId::Id(1),
                    ..site("tx", "net.c", "tx", 2)
                },
            ],
        );
        reg.define_classmap(
            ClassMap::new(
                "net_classes_cp",
                Sym::intern("net_core_cp"),
                0,
                MapType::DisjointBits,
                alloc::vec!["rx".into(), "tx".into()],
            )
            .unwrap(),
        )
        .unwrap();
        reg.use_classmap("net_core_cp", "net_classes_cp");
        reg.bind_class_parameter(ClassParameter::new(
            "net_classes_param_cp",
            Sym::intern("net_core_cp"),
            Sym::intern("net_classes_cp"),
        ));

        let matched = reg.write_class_parameter("net_classes_param_cp", "1").unwrap();
        assert_eq!(matched, 2); // both classes' synthesized queries ran
        let lines = reg.describe_all();
        assert!(lines[0].starts_with("net.c:1 [net_core_cp]rx =p"));
        assert!(lines[1].starts_with("net.c:2 [net_core_cp]tx =_"));
    }

    #[cfg(feature = "classes")]
    #[test]
    fn scenario_s3_class_parameter_bit_vector() {
        use crate::classmap::MapType;

        let reg = Registry::new();
        reg.add_module(
            "m1_s3",
            alloc::vec![
                SiteSpec { class_id: ClassId::Id(0), ..site("x", "a.c", "x", 1) },
                SiteSpec { class_id: ClassId::Id(1), ..site("y", "a.c", "y", 2) },
                SiteSpec { class_id: ClassId::Id(2), ..site("z", "a.c", "z", 3) },
            ],
        );
        reg.define_classmap(
            ClassMap::new(
                "classes_s3",
                Sym::intern("m1_s3"),
                0,
                MapType::DisjointBits,
                alloc::vec!["X".into(), "Y".into(), "Z".into()],
            )
            .unwrap(),
        )
        .unwrap();
        reg.use_classmap("m1_s3", "classes_s3");
        reg.bind_class_parameter(ClassParameter::new(
            "param_s3",
            Sym::intern("m1_s3"),
            Sym::intern("classes_s3"),
        ));

        reg.write_class_parameter("param_s3", "5").unwrap(); // 0b101
        let lines = reg.describe_all();
        assert!(lines[0].contains("=p"));
        assert!(!lines[1].contains("=p"));
        assert!(lines[2].contains("=p"));

        reg.write_class_parameter("param_s3", "0").unwrap();
        let lines = reg.describe_all();
        assert!(lines.iter().all(|l| !l.contains("=p")));
    }

    #[cfg(feature = "classes")]
    #[test]
    fn scenario_s2_class_query_by_name_and_unknown() {
        use crate::classmap::MapType;

        let reg = Registry::new();
        reg.add_module(
            "m1_s2",
            alloc::vec![
                SiteSpec { class_id: ClassId::Id(0), ..site("a", "a.c", "a", 1) },
                SiteSpec { class_id: ClassId::Id(1), ..site("b", "a.c", "b", 2) },
                SiteSpec { class_id: ClassId::Id(2), ..site("c", "a.c", "c", 3) },
                site("d", "a.c", "d", 4), // class-less (ClassId::Default)
            ],
        );
        reg.define_classmap(
            ClassMap::new(
                "classes_s2",
                Sym::intern("m1_s2"),
                0,
                MapType::DisjointBits,
                alloc::vec!["X".into(), "Y".into(), "Z".into()],
            )
            .unwrap(),
        )
        .unwrap();
        reg.use_classmap("m1_s2", "classes_s2");

        assert_eq!(reg.exec_query("class Y +p").unwrap(), 1);
        assert_eq!(reg.exec_query("class W +p").unwrap(), 0);
    }

    /// A module that owns two maps, only one of which has a bound class
    /// parameter, should only have the bound map's sites shielded from
    /// a class-less query; the unbound map's sites stay reachable.
    #[cfg(feature = "classes")]
    #[test]
    fn class_protection_is_scoped_per_map_not_per_module() {
        use crate::classmap::MapType;

        let reg = Registry::new();
        reg.add_module(
            "mixed_mod",
            alloc::vec![
                SiteSpec { class_id: ClassId::Id(0), ..site("bound_site", "a.c", "x", 1) },
                SiteSpec { class_id: ClassId::Id(10), ..site("unbound_site", "a.c", "y", 2) },
            ],
        );
        reg.define_classmap(
            ClassMap::new(
                "bound_map",
                Sym::intern("mixed_mod"),
                0,
                MapType::DisjointBits,
                alloc::vec!["a".into()],
            )
            .unwrap(),
        )
        .unwrap();
        reg.define_classmap(
            ClassMap::new(
                "unbound_map",
                Sym::intern("mixed_mod"),
                10,
                MapType::DisjointBits,
                alloc::vec!["b".into()],
            )
            .unwrap(),
        )
        .unwrap();
        reg.use_classmap("mixed_mod", "bound_map");
        reg.use_classmap("mixed_mod", "unbound_map");
        reg.bind_class_parameter(ClassParameter::new(
            "bound_param",
            Sym::intern("mixed_mod"),
            Sym::intern("bound_map"),
        ));

        // a class-less query must skip the site under the bound map...
        assert_eq!(reg.exec_query("module mixed_mod +p").unwrap(), 1);
        let lines = reg.describe_all();
        assert!(lines[0].contains("=_")); // bound_site: untouched
        assert!(lines[1].contains("=p")); // unbound_site: flipped
    }

    #[cfg(feature = "trace")]
    #[test]
    fn scenario_s5_trace_destinations() {
        let reg = Registry::new();
        reg.add_module(
            "m1_s5",
            alloc::vec![site("a", "a.c", "a", 1), site("b", "a.c", "b", 2)],
        );
        reg.exec_query("open tbt").unwrap();
        let matched = reg.exec_query("module m1_s5 +T").unwrap();
        assert_eq!(matched, 2);
        assert!(reg.exec_query("close tbt").is_err());
        assert_eq!(reg.exec_query("module m1_s5 -T").unwrap(), 2);
        let (default_name, open) = reg.trace_summary();
        assert_eq!(default_name.as_deref(), Some("tbt"));
        assert_eq!(open, alloc::vec!["tbt".to_string()]);
        reg.exec_query("close tbt").unwrap();
        let (default_name, open) = reg.trace_summary();
        assert!(default_name.is_none());
        assert!(open.is_empty());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn scenario_s6_boot_style_global_and_module_scoped() {
        let reg = Registry::new();
        reg.add_module("m1_s6", alloc::vec![site("do_a", "a.c", "a", 1), site("do_b", "a.c", "b", 2)]);
        reg.add_module("m2_s6", alloc::vec![site("do_a", "b.c", "a", 1)]);
        reg.exec_query("func do_a +p").unwrap();
        reg.exec_query_for_module("m1_s6", "func do_b +p").unwrap();
        let lines = reg.describe_all();
        assert!(lines[0].contains("=p")); // m1_s6::do_a
        assert!(lines[1].contains("=p")); // m1_s6::do_b
        assert!(lines[2].contains("=p")); // m2_s6::do_a (func do_a is global)
    }
}
