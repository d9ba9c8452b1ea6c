use clap::Parser;
use homefinder::{
    ArtifactStore, HomeResult, MeasureConfigError, MeasureOutputFile, MeasureRegistry,
    RecordStore, Region, TimeZoneFinder,
};
use log::{debug, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Find the home locations of users from their geotagged tweets.
///
/// For every user the measures, including the home location, are calculated and appended as a
/// row to the output file. Users already in the output file are skipped, so an interrupted run can
/// be restarted with the same arguments.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findhomes")]
#[clap(author, version, about)]
struct FindHomesOptionsInit {
    /// The paths to the tweet databases, or directories containing them.
    ///
    /// If this is not specified, then the program will check for it in the "GEOTWEETS_DB"
    /// environment variable.
    #[clap(short, long, required = true, multiple_values = true)]
    #[clap(env = "GEOTWEETS_DB", value_delimiter = ':')]
    databases: Vec<PathBuf>,

    /// The path to the output file.
    ///
    /// If this is not specified, then the program will check for it in the "HOMES_OUTPUT"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "HOMES_OUTPUT")]
    output: PathBuf,

    /// Either a file with one user id per line, or a single user id.
    users: Option<String>,

    /// Process every user in the databases instead.
    #[clap(long)]
    all_users: bool,

    /// A GeoJSON file with the region for counting tweets in a region.
    #[clap(short, long)]
    region: Option<PathBuf>,

    /// The directory where the per-user clustering results are saved.
    #[clap(short, long, default_value = ".")]
    artifacts_dir: PathBuf,

    /// Don't save the per-user clustering results.
    #[clap(long)]
    no_artifacts: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
enum UserSource {
    All,
    Single(i64),
    File(PathBuf),
}

impl Display for UserSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            UserSource::All => write!(f, "all users"),
            UserSource::Single(id) => write!(f, "user {}", id),
            UserSource::File(pth) => write!(f, "{}", pth.display()),
        }
    }
}

#[derive(Debug)]
struct FindHomesOptionsChecked {
    /// The paths to the databases.
    databases: Vec<PathBuf>,

    /// The path to the output file.
    output: PathBuf,

    /// Which users to process.
    users: UserSource,

    /// The region file, if any.
    region: Option<PathBuf>,

    /// Where to save the clustering results, if anywhere.
    artifacts_dir: Option<PathBuf>,

    /// Verbose output
    verbose: bool,
}

impl Display for FindHomesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        for db in &self.databases {
            writeln!(f, "   Database: {}", db.display())?;
        }
        writeln!(f, "     Output: {}", self.output.display())?;
        writeln!(f, "      Users: {}", self.users)?;
        match &self.region {
            Some(region) => writeln!(f, "     Region: {}", region.display())?,
            None => writeln!(f, "     Region: none")?,
        }
        match &self.artifacts_dir {
            Some(dir) => writeln!(f, "  Artifacts: {}", dir.display())?,
            None => writeln!(f, "  Artifacts: not saved")?,
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> HomeResult<FindHomesOptionsChecked> {
    let FindHomesOptionsInit {
        databases,
        output,
        users,
        all_users,
        region,
        artifacts_dir,
        no_artifacts,
        verbose,
    } = FindHomesOptionsInit::parse();

    let users = match (all_users, users) {
        (true, _) => UserSource::All,
        (false, Some(users)) => match users.trim().parse::<i64>() {
            Ok(id) => UserSource::Single(id),
            Err(_) => UserSource::File(PathBuf::from(users)),
        },
        (false, None) => return Err("give a user id, a user id file, or --all-users".into()),
    };

    if let UserSource::File(ref pth) = users {
        if !pth.is_file() {
            return Err(format!("no such user id file: {}", pth.display()).into());
        }
    }

    let artifacts_dir = if no_artifacts {
        None
    } else {
        Some(artifacts_dir)
    };

    Ok(FindHomesOptionsChecked {
        databases,
        output,
        users,
        region,
        artifacts_dir,
        verbose,
    })
}

/// The user ids to process, ascending and without duplicates.
fn load_user_ids(source: &UserSource, store: &RecordStore) -> HomeResult<Vec<i64>> {
    match source {
        UserSource::All => store.user_ids(),
        UserSource::Single(id) => Ok(vec![*id]),
        UserSource::File(pth) => {
            let f = BufReader::new(File::open(pth)?);

            let mut ids = BTreeSet::new();
            for (i, line) in f.lines().enumerate() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let id = line.parse::<i64>().map_err(|err| {
                    format!("bad user id on line {} of {}: {}", i + 1, pth.display(), err)
                })?;
                ids.insert(id);
            }

            Ok(ids.into_iter().collect())
        }
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HomeResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .with_module_level("homefinder", level)
        .with_module_level("findhomes", level)
        .init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let region = match &opts.region {
        Some(pth) => Some(Region::from_file(pth)?),
        None => None,
    };

    let artifacts = match &opts.artifacts_dir {
        Some(dir) => Some(ArtifactStore::in_dir(dir)?),
        None => None,
    };

    let registry = MeasureRegistry::standard(TimeZoneFinder::global(), region, artifacts)?;

    let store = RecordStore::connect(&opts.databases)?;
    let (mut out, done) = MeasureOutputFile::open(&opts.output, registry.header())?;

    let user_ids = load_user_ids(&opts.users, &store)?;
    info!("{} users requested", user_ids.len());

    const PROGRESS_INTERVAL: usize = 1_000;

    let mut num_processed: usize = 0;
    let mut num_skipped: usize = 0;
    let mut num_failed: usize = 0;

    for (i, user_id) in user_ids.iter().copied().enumerate() {
        if i > 0 && i % PROGRESS_INTERVAL == 0 {
            info!(
                "{} of {} users: {} processed, {} skipped, {} failed",
                i,
                user_ids.len(),
                num_processed,
                num_skipped,
                num_failed
            );
        }

        if done.contains(&user_id) {
            num_skipped += 1;
            continue;
        }

        let records = match store.records_for(user_id) {
            Ok(records) => records,
            Err(err) => {
                warn!("Error loading records for user {}: {}", user_id, err);
                num_failed += 1;
                continue;
            }
        };

        if records.is_empty() {
            debug!("No records for user {}", user_id);
            num_skipped += 1;
            continue;
        }

        match registry.run(&records) {
            Ok(row) => {
                out.write(&row)?;
                num_processed += 1;
            }
            Err(err) if err.downcast_ref::<MeasureConfigError>().is_some() => return Err(err),
            Err(err) => {
                warn!("Error measuring user {}: {}", user_id, err);
                num_failed += 1;
            }
        }
    }

    info!(
        "Finished: {} processed, {} skipped, {} failed. Output in {}",
        num_processed,
        num_skipped,
        num_failed,
        out.path().display()
    );

    Ok(())
}
