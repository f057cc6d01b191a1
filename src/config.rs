use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::net::{SocketAddr, IpAddr};
use std::fmt::{Display, Formatter};
use std::time::Duration;

use clap::Parser;
use mfgsite_lib::gate::RouteSets;

use crate::error::{self, Context};

mod shape;

pub type Kdf = hkdf::Hkdf<sha3::Sha3_512>;

pub trait TryDefault: Sized {
    type Error;

    fn try_default() -> Result<Self, Self::Error>;
}

#[derive(Debug, Parser)]
#[command(author, version ,about, long_about = None)]
pub struct CliArgs {
    /// a config file to load settings from. can be specified multiple times,
    /// later files override earlier ones
    #[arg(long)]
    config: Vec<PathBuf>
}

pub struct Config {
    pub settings: Settings,
    pub kdf: Kdf,
}

pub fn get_config() -> error::Result<Config> {
    Config::from_args(CliArgs::parse())
}

impl Config {
    pub fn from_args(args: CliArgs) -> error::Result<Self> {
        let cwd = std::env::current_dir()
            .context("failed to retrieve cwd for Settings")?;
        let mut settings = Settings::try_default()?;

        for config_path in args.config {
            let full = if config_path.is_absolute() {
                config_path
            } else {
                normalize(cwd.join(config_path))
            };

            tracing::debug!("loading config file \"{}\"", full.display());

            let loaded = Self::load_file(&full)?;
            let src = SrcFile::new(&full)?;
            let dot = DotPath::new(&"settings");

            settings.merge(&src, dot, loaded)?;
        }

        {
            let meta = metadata(&settings.data).context(
                "failed to retrieve metadata for settings.data"
            )?.context(
                "settings.data does not exist"
            )?;

            if !meta.is_dir() {
                return Err(error::Error::new().message(
                    "settings.data is not a directory"
                ));
            }
        }

        if settings.sec.session.refresh >= settings.sec.session.duration {
            return Err(error::Error::new().message(
                "settings.sec.session.refresh must be less than settings.sec.session.duration"
            ));
        }

        tracing::debug!(
            "settings loaded. data: {} listeners: {}",
            settings.data.display(),
            settings.listeners.len()
        );

        let kdf = Kdf::new(None, settings.master_key.as_bytes());

        Ok(Config {
            settings,
            kdf
        })
    }

    fn load_file(path: &PathBuf) -> error::Result<shape::Settings> {
        let ext = path.extension().context(format!(
            "failed to retrieve the file extension for config file: \"{}\"", path.display()
        ))?;

        let ext = ext.to_ascii_lowercase();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .context(format!("failed to open config file: \"{}\"", path.display()))?;
        let reader = std::io::BufReader::new(file);

        if ext.eq("yaml") || ext.eq("yml") {
            serde_yaml::from_reader(reader).context(format!(
                "failed to parse yaml config file: \"{}\"", path.display()
            ))
        } else if ext.eq("json") {
            serde_json::from_reader(reader).context(format!(
                "failed to parse json config file: \"{}\"", path.display()
            ))
        } else {
            Err(error::Error::new().message(format!(
                "unknown type of config file: \"{}\"", path.display()
            )))
        }
    }
}

struct SrcFile<'a> {
    parent: &'a Path,
    src: &'a Path,
}

impl<'a> SrcFile<'a> {
    fn new(src: &'a Path) -> error::Result<Self> {
        let parent = src.parent().context(format!(
            "failed to retrieve parent path from source file \"{}\"", src.display()
        ))?;

        Ok(SrcFile {
            parent,
            src
        })
    }
}

impl<'a> Display for SrcFile<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.src.display())
    }
}

struct Quote<'a>(&'a dyn Display);

impl<'a> Display for Quote<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

struct DotPath<'a>(Vec<&'a dyn Display>);

impl<'a> DotPath<'a> {
    fn new(name: &'a (dyn Display)) -> Self {
        DotPath(vec![name])
    }

    fn push(&self, name: &'a (dyn Display)) -> Self {
        let mut path = self.0.clone();
        path.push(name);

        DotPath(path)
    }
}

impl<'a> Display for DotPath<'a> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;

        for name in &self.0 {
            if first {
                write!(fmt, "{name}")?;
                first = false;
            } else {
                write!(fmt, ".{name}")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Settings {
    pub data: PathBuf,
    pub master_key: String,
    pub listeners: HashMap<String, Listener>,
    pub sec: Sec,
    pub gate: RouteSets,
    pub db: Db,
}

impl Settings {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, settings: shape::Settings) -> error::Result<()> {
        if let Some(data) = settings.data {
            self.data = check_dir(data, src, dot.push(&"data"))?;
        }

        if let Some(master_key) = settings.master_key {
            self.master_key = master_key;
        }

        if let Some(listeners) = settings.listeners {
            for (key, listener) in listeners {
                if let Some(found) = self.listeners.get_mut(&key) {
                    found.merge(src, dot.push(&Quote(&key)), listener)?;
                } else {
                    let mut default = Listener::default();
                    default.merge(src, dot.push(&Quote(&key)), listener)?;

                    self.listeners.insert(key, default);
                }
            }
        }

        if let Some(sec) = settings.sec {
            self.sec.merge(src, dot.push(&"sec"), sec)?;
        }

        if let Some(gate) = settings.gate {
            merge_gate(&mut self.gate, src, dot.push(&"gate"), gate)?;
        }

        if let Some(db) = settings.db {
            self.db.merge(src, dot.push(&"db"), db)?;
        }

        Ok(())
    }
}

impl TryDefault for Settings {
    type Error = error::Error;

    fn try_default() -> Result<Self, Self::Error> {
        let cwd = std::env::current_dir()
            .context("failed to retrieve cwd for Settings")?;

        Ok(Settings {
            data: cwd.join("data"),
            master_key: "mfgsite_master_key_secret".into(),
            listeners: HashMap::new(),
            sec: Sec::default(),
            gate: RouteSets::default(),
            db: Db::default(),
        })
    }
}

#[derive(Debug)]
pub struct Listener {
    pub addr: SocketAddr,
}

impl Listener {
    fn merge(&mut self, src: &SrcFile<'_>, dot_path: DotPath<'_>, listener: shape::Listener) -> error::Result<()> {
        self.addr = match SocketAddr::from_str(&listener.addr) {
            Ok(valid) => valid,
            Err(_) => match IpAddr::from_str(&listener.addr) {
                Ok(valid) => SocketAddr::from((valid, 8080)),
                Err(_) => {
                    return Err(error::Error::new().message(format!(
                        "{dot_path}.addr invalid: \"{}\" file: {src}", listener.addr
                    )));
                }
            }
        };

        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            addr: SocketAddr::from((
                IpAddr::from([0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]),
                8080
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct Sec {
    pub session: Session,
}

impl Sec {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, sec: shape::Sec) -> error::Result<()> {
        if let Some(session) = sec.session {
            self.session.merge(src, dot.push(&"session"), session)?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Session {
    pub secure: bool,
    pub domain: Option<String>,
    pub duration: Duration,
    /// a session with less than this much time remaining is extended when
    /// it is used
    pub refresh: Duration,
}

impl Session {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, session: shape::Session) -> error::Result<()> {
        if let Some(secure) = session.secure {
            self.secure = secure;
        }

        if let Some(domain) = session.domain {
            self.domain = Some(domain);
        }

        if let Some(duration) = session.duration {
            if duration == 0 {
                return Err(error::Error::new().message(format!(
                    "{} must be greater than 0. file: {src}", dot.push(&"duration")
                )));
            }

            self.duration = Duration::from_secs(duration);
        }

        if let Some(refresh) = session.refresh {
            self.refresh = Duration::from_secs(refresh);
        }

        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Session {
            secure: true,
            domain: None,
            duration: Duration::from_secs(60 * 60 * 24 * 7),
            refresh: Duration::from_secs(60 * 60 * 24),
        }
    }
}

fn merge_gate(routes: &mut RouteSets, src: &SrcFile<'_>, dot: DotPath<'_>, gate: shape::Gate) -> error::Result<()> {
    if let Some(protected) = gate.protected {
        routes.protected = check_prefixes(protected, src, dot.push(&"protected"))?;
    }

    if let Some(admin_only) = gate.admin_only {
        routes.admin_only = check_prefixes(admin_only, src, dot.push(&"admin_only"))?;
    }

    if let Some(auth) = gate.auth {
        routes.auth = check_prefixes(auth, src, dot.push(&"auth"))?;
    }

    if let Some(reset_confirm) = gate.reset_confirm {
        routes.reset_confirm = check_prefix(reset_confirm, src, &dot.push(&"reset_confirm"))?;
    }

    Ok(())
}

#[derive(Debug)]
pub struct Db {
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub pool_size: usize,
}

impl Db {
    fn merge(&mut self, _src: &SrcFile<'_>, _dot: DotPath<'_>, db: shape::Db) -> error::Result<()> {
        if let Some(user) = db.user {
            self.user = user;
        }

        if let Some(password) = db.password {
            self.password = Some(password);
        }

        if let Some(host) = db.host {
            self.host = host;
        }

        if let Some(port) = db.port {
            self.port = port;
        }

        if let Some(dbname) = db.dbname {
            self.dbname = dbname;
        }

        if let Some(pool_size) = db.pool_size {
            self.pool_size = pool_size;
        }

        Ok(())
    }
}

impl Default for Db {
    fn default() -> Self {
        Db {
            user: "postgres".into(),
            password: None,
            host: "localhost".into(),
            port: 5432,
            dbname: "mfgsite".into(),
            pool_size: 8,
        }
    }
}

fn metadata<P>(path: P) -> Result<Option<std::fs::Metadata>, std::io::Error>
where
    P: AsRef<Path>
{
    match path.as_ref().metadata() {
        Ok(m) => Ok(Some(m)),
        Err(err) => match err.kind() {
            std::io::ErrorKind::NotFound => Ok(None),
            _ => Err(err)
        }
    }
}

/// resolves `.` and `..` without touching the file system
fn normalize<P>(path: P) -> PathBuf
where
    P: AsRef<Path>
{
    let mut rtn = PathBuf::new();

    for comp in path.as_ref().components() {
        match comp {
            Component::ParentDir => {
                rtn.pop();
            }
            Component::CurDir => {}
            other => {
                rtn.push(other.as_os_str());
            }
        }
    }

    rtn
}

fn check_dir(given: PathBuf, src: &SrcFile<'_>, dot: DotPath<'_>) -> error::Result<PathBuf> {
    let full = if given.is_absolute() {
        given
    } else {
        normalize(src.parent.join(given))
    };

    tracing::debug!("{dot} {src} checking {}", full.display());

    let meta = metadata(&full).context(format!(
        "{dot} failed to retrieve metadata for: {src}"
    ))?.context(format!(
        "{dot} {src} was not found"
    ))?;

    if !meta.is_dir() {
        return Err(error::Error::new().message(format!(
            "{dot} is not a directory in: {src}"
        )));
    }

    Ok(full)
}

fn check_prefix(given: String, src: &SrcFile<'_>, dot: &DotPath<'_>) -> error::Result<String> {
    let trimmed = given.trim();

    if !trimmed.starts_with('/') {
        return Err(error::Error::new().message(format!(
            "{dot} \"{given}\" must start with \"/\". file: {src}"
        )));
    }

    if trimmed.contains(['?', '#']) {
        return Err(error::Error::new().message(format!(
            "{dot} \"{given}\" must be a path without query or fragment. file: {src}"
        )));
    }

    Ok(trimmed.to_owned())
}

fn check_prefixes(given: Vec<String>, src: &SrcFile<'_>, dot: DotPath<'_>) -> error::Result<Vec<String>> {
    let mut rtn = Vec::with_capacity(given.len());

    for (index, prefix) in given.into_iter().enumerate() {
        rtn.push(check_prefix(prefix, src, &dot.push(&index))?);
    }

    Ok(rtn)
}

#[cfg(test)]
mod test {
    use super::*;

    fn src() -> PathBuf {
        PathBuf::from("/etc/mfgsite/settings.yaml")
    }

    #[test]
    fn normalize_parent_and_current() {
        assert_eq!(normalize("/etc/mfgsite/../data/./jobs"), PathBuf::from("/etc/data/jobs"));
    }

    #[test]
    fn gate_prefixes_replace_defaults() {
        let path = src();
        let src = SrcFile::new(&path).unwrap();
        let mut routes = RouteSets::default();

        let shape: shape::Gate = serde_yaml::from_str(
            "protected: [\"/dashboard\", \" /plants \"]\nreset_confirm: /reset-password/verify\n"
        ).unwrap();

        merge_gate(&mut routes, &src, DotPath::new(&"gate"), shape).unwrap();

        assert_eq!(routes.protected, vec!["/dashboard".to_owned(), "/plants".to_owned()]);
        assert_eq!(routes.reset_confirm, "/reset-password/verify");
        assert_eq!(routes.auth, RouteSets::default().auth, "unset sets keep defaults");
    }

    #[test]
    fn gate_prefix_must_be_absolute() {
        let path = src();
        let src = SrcFile::new(&path).unwrap();
        let mut routes = RouteSets::default();

        let shape: shape::Gate = serde_yaml::from_str("admin_only: [\"admin/users\"]\n").unwrap();

        assert!(merge_gate(&mut routes, &src, DotPath::new(&"gate"), shape).is_err());

        let shape: shape::Gate = serde_yaml::from_str("auth: [\"/login?next=1\"]\n").unwrap();

        assert!(merge_gate(&mut routes, &src, DotPath::new(&"gate"), shape).is_err());
    }

    #[test]
    fn session_durations() {
        let path = src();
        let src = SrcFile::new(&path).unwrap();
        let mut session = Session::default();

        let shape: shape::Session = serde_yaml::from_str("duration: 3600\nrefresh: 600\nsecure: false\n").unwrap();
        session.merge(&src, DotPath::new(&"session"), shape).unwrap();

        assert_eq!(session.duration, Duration::from_secs(3600));
        assert_eq!(session.refresh, Duration::from_secs(600));
        assert!(!session.secure);

        let shape: shape::Session = serde_yaml::from_str("duration: 0\n").unwrap();

        assert!(session.merge(&src, DotPath::new(&"session"), shape).is_err());
    }
}
