use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::future::Future;
use std::io::ErrorKind;

use chrono::{DateTime, Local};
use futures::stream::FuturesUnordered;
use tracing::Instrument;
use tokio::task::JoinHandle;
use tokio::io::AsyncWriteExt;
use tokio::fs::File;
use serde::{Serialize, Deserialize};

use crate::state::ArcShared;
use crate::error::{self, Context};

mod session;

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobInfo {
    last_run: Option<DateTime<Local>>
}

impl JobInfo {
    fn load(job_file: &Path) -> error::Result<Self> {
        let result = std::fs::OpenOptions::new()
            .read(true)
            .open(job_file);

        match result {
            Ok(file) => serde_json::from_reader(&file)
                .context("failed to read jobs file"),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(JobInfo::default()),
                _ => Err(err.into()),
            }
        }
    }

    async fn save(&self, job_file: &Path) -> error::Result<()> {
        let json_buffer = serde_json::to_vec(self)
            .context("failed to create json job info")?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(job_file)
            .await
            .context("failed to open job file")?;

        file.write_all(&json_buffer)
            .await
            .context("failed to write job info to file")?;

        Ok(())
    }
}

/// true if the job has never run or a scheduled run was missed while the
/// server was down
fn missed_run(schedule: &cron::Schedule, last_run: Option<&DateTime<Local>>, now: &DateTime<Local>) -> bool {
    let Some(last_run) = last_run else {
        return true;
    };

    schedule.after(last_run)
        .next()
        .map(|scheduled| scheduled <= *now)
        .unwrap_or(false)
}

struct Job<F> {
    state: ArcShared,
    schedule: cron::Schedule,
    info: JobInfo,
    file: PathBuf,
    runner: F,
}

impl<F, T> Job<F>
where
    T: Future<Output = error::Result<()>>,
    F: Fn(ArcShared) -> T,
{
    async fn run_once(&mut self) -> error::Result<()> {
        if let Err(err) = (self.runner)(Arc::clone(&self.state)).await {
            tracing::error!("job failed with error: {err}");

            return Ok(());
        }

        let local_now = Local::now();

        tracing::debug!("job finished {local_now}");

        self.info.last_run = Some(local_now);
        self.info.save(&self.file).await
    }

    async fn run(mut self) -> error::Result<()> {
        if missed_run(&self.schedule, self.info.last_run.as_ref(), &Local::now()) {
            tracing::info!("job has not run since its last scheduled time. running job");

            self.run_once().await?;
        }

        let upcoming = self.schedule.upcoming_owned(Local);

        for next in upcoming {
            let Ok(delta) = (next - Local::now()).to_std() else {
                continue;
            };

            tracing::debug!("waiting for {:#?}", delta);

            tokio::time::sleep(delta).await;

            tracing::info!("running job");

            self.run_once().await?;
        }

        tracing::info!("job finished");

        Ok(())
    }
}

fn get_jobs_dir(data: &Path) -> error::Result<PathBuf> {
    let jobs_dir = data.join("jobs");

    let metadata = match jobs_dir.metadata() {
        Ok(m) => m,
        Err(err) => match err.kind() {
            ErrorKind::NotFound => {
                std::fs::create_dir(&jobs_dir)
                    .context("failed to create jobs data directory")?;

                return Ok(jobs_dir);
            },
            _ => {
                return Err(err.into());
            }
        }
    };

    if !metadata.is_dir() {
        Err(error::Error::new()
            .message("jobs data directory is not a directory"))
    } else {
        Ok(jobs_dir)
    }
}

fn spawn_job<F, T>(
    jobs_dir: &Path,
    state: &ArcShared,
    name: &'static str,
    crontab: &'static str,
    runner: F
) -> error::Result<JoinHandle<()>>
where
    T: Future<Output = error::Result<()>> + Send,
    F: Fn(ArcShared) -> T + Send + 'static,
{
    let file = jobs_dir.join(format!("{name}.json"));
    let info = JobInfo::load(&file)?;

    let schedule = cron::Schedule::from_str(crontab)
        .context(format!("failed to parse crontab for job {name}"))?;

    let job = Job {
        state: Arc::clone(state),
        schedule,
        info,
        file,
        runner,
    };

    Ok(tokio::spawn(async move {
        let job_span = tracing::info_span!("job", name = name);

        if let Err(err) = job.run().instrument(job_span).await {
            tracing::error!("job {name} failed with error {err}");
        }
    }))
}

// sec  min   hour    day of month   month   day of week   year
pub fn background(state: &ArcShared, data: &Path) -> error::Result<FuturesUnordered<JoinHandle<()>>> {
    let jobs_dir = get_jobs_dir(data)?;
    let waiter = FuturesUnordered::new();

    waiter.push(spawn_job(&jobs_dir, state, "session_cleanup", "0 0 * * * * *", session::cleanup)?);

    Ok(waiter)
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn hourly() -> cron::Schedule {
        cron::Schedule::from_str("0 0 * * * * *").unwrap()
    }

    #[test]
    fn never_run() {
        assert!(missed_run(&hourly(), None, &Local::now()));
    }

    #[test]
    fn missed_while_down() {
        let last = Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();

        assert!(missed_run(&hourly(), Some(&last), &(last + Duration::minutes(90))));
        assert!(!missed_run(&hourly(), Some(&last), &(last + Duration::minutes(30))));
    }

    #[test]
    fn missing_job_file() {
        let file = std::env::temp_dir().join("mfgsite-jobs-test-missing.json");
        let _ = std::fs::remove_file(&file);

        let info = JobInfo::load(&file).unwrap();

        assert!(info.last_run.is_none());
    }
}
