use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::BuildGroundTruthArgs;
use crate::model::{
    ExpectedLabels, GroundTruthManifest, GroundTruthNotes, LabelSet, PatternLabel,
    SourceFingerprint, TicketId, label_names,
};
use crate::universe::TicketUniverse;
use crate::util::{
    clean_cell, ensure_parent_directory, file_name_string, lossy_record, sha256_file,
    write_json_pretty,
};
use crate::vocabulary::PatternVocabulary;

const GROUND_TRUTH_MANIFEST_VERSION: u32 = 1;
const ORPHAN_LIST_LIMIT: usize = 50;

mod builder;
mod matrix;
mod output;
mod overrides;
mod run;

use self::builder::*;
use self::matrix::*;
use self::output::*;
use self::overrides::*;

pub use self::run::run;
