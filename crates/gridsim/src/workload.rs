//! Serializable description of the tasks submitted to the masters.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::Task;
use crate::topology::Topology;

/// Random variable of a generated workload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value.
    Constant {
        /// The value.
        value: f64,
    },
    /// Uniform on `[min, max]`.
    Uniform {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Exponential with the given mean.
    Exponential {
        /// Mean value.
        mean: f64,
    },
}

impl Distribution {
    /// Draws a value.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { min, max } => {
                if min < max {
                    rng.gen_range(min..=max)
                } else {
                    min
                }
            }
            Distribution::Exponential { mean } => -mean * (1. - rng.gen::<f64>()).ln(),
        }
    }

    fn validate(&self, group: &str, what: &str) -> Result<(), ConfigError> {
        let reason = match *self {
            Distribution::Constant { value } if value < 0. => Some("must not be negative"),
            Distribution::Uniform { min, max } if min < 0. || max < min => Some("needs 0 <= min <= max"),
            Distribution::Exponential { mean } if mean <= 0. => Some("needs a positive mean"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(ConfigError::InvalidParameter {
                center: group.to_owned(),
                reason: format!("{} {}", what, reason),
            }),
            None => Ok(()),
        }
    }
}

fn default_user() -> String {
    "user".to_owned()
}

/// Explicitly listed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Submission time.
    #[serde(default)]
    pub arrival: f64,
    /// Processing size in Mflop.
    pub processing: f64,
    /// Input size in Mbit.
    pub send: f64,
    /// Result size in Mbit.
    #[serde(default)]
    pub result: f64,
}

/// Tasks of one user submitted to one master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkloadGroup {
    /// Explicit list.
    Tasks {
        /// Master name.
        master: String,
        /// Owning user.
        #[serde(default = "default_user")]
        user: String,
        /// Tasks in submission order.
        tasks: Vec<TaskConfig>,
    },
    /// Generated tasks.
    Random {
        /// Master name.
        master: String,
        /// Owning user.
        #[serde(default = "default_user")]
        user: String,
        /// Number of tasks.
        count: usize,
        /// Submission time of the first task.
        #[serde(default)]
        start: f64,
        /// Time between consecutive submissions.
        interarrival: Distribution,
        /// Processing size in Mflop.
        processing: Distribution,
        /// Input size in Mbit.
        send: Distribution,
        /// Result size in Mbit.
        result: Distribution,
    },
}

/// Workload made of groups. Task ids are assigned sequentially across groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadConfig {
    /// Task groups.
    pub groups: Vec<WorkloadGroup>,
}

impl WorkloadConfig {
    /// Creates the tasks. Generated values depend only on `seed`.
    pub fn build(&self, topology: &Topology, seed: u64) -> Result<Vec<Task>, ConfigError> {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut tasks = Vec::new();

        for group in &self.groups {
            match group {
                WorkloadGroup::Tasks { master, user, tasks: list } => {
                    let origin = topology
                        .find(master)
                        .ok_or_else(|| ConfigError::UnknownCenter(master.clone()))?;
                    for task in list {
                        if task.arrival < 0. || task.processing < 0. || task.send < 0. || task.result < 0. {
                            return Err(ConfigError::InvalidParameter {
                                center: master.clone(),
                                reason: format!("task {} has a negative time or size", tasks.len()),
                            });
                        }
                        let id = tasks.len() as u64;
                        tasks.push(Task::new(
                            id,
                            user,
                            origin,
                            task.arrival,
                            task.processing,
                            task.send,
                            task.result,
                        ));
                    }
                }
                WorkloadGroup::Random {
                    master,
                    user,
                    count,
                    start,
                    interarrival,
                    processing,
                    send,
                    result,
                } => {
                    let origin = topology
                        .find(master)
                        .ok_or_else(|| ConfigError::UnknownCenter(master.clone()))?;
                    if *start < 0. || start.is_nan() {
                        return Err(ConfigError::InvalidParameter {
                            center: master.clone(),
                            reason: "start must not be negative".to_owned(),
                        });
                    }
                    interarrival.validate(master, "interarrival")?;
                    processing.validate(master, "processing size")?;
                    send.validate(master, "send size")?;
                    result.validate(master, "result size")?;

                    let mut time = *start;
                    for _ in 0..*count {
                        let id = tasks.len() as u64;
                        tasks.push(Task::new(
                            id,
                            user,
                            origin,
                            time,
                            processing.sample(&mut rng),
                            send.sample(&mut rng),
                            result.sample(&mut rng),
                        ));
                        time += interarrival.sample(&mut rng);
                    }
                }
            }
        }
        Ok(tasks)
    }

    /// Returns the number of tasks the workload describes.
    pub fn len(&self) -> usize {
        self.groups
            .iter()
            .map(|group| match group {
                WorkloadGroup::Tasks { tasks, .. } => tasks.len(),
                WorkloadGroup::Random { count, .. } => *count,
            })
            .sum()
    }

    /// Returns true if the workload has no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
