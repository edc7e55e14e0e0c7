use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cli::{EvalMode, EvaluateArgs};
use crate::model::{ExpectedLabels, LabelSet, PatternLabel, TicketId};
use crate::predictions::{PredictionOutcome, load_prediction, result_file_path};
use crate::universe::parse_ticket_id;
use crate::util::{now_utc_string, write_json_pretty};

const MISSING_PREVIEW_LIMIT: usize = 10;

mod expected;
mod report;
mod run;
mod scoring;

use self::report::*;
use self::scoring::*;

pub use self::expected::load_expected_labels;
pub use self::run::run;
