use machine_learning::arch::PoseNetConfig;

/// The shape of a dataset's sequences once preprocessed and the model width trained on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetConfig {
    pub name: &'static str,
    pub frame_l: usize,
    pub joint_n: usize,
    pub joint_d: usize,
    /// Pairwise joint distances per frame, `joint_n * (joint_n - 1) / 2`.
    pub feat_d: usize,
    pub filters: usize,
    pub class_count: usize,
}

impl DatasetConfig {
    pub fn jhmdb() -> Self {
        Self {
            name: "JHMDB",
            frame_l: 32,
            joint_n: 15,
            joint_d: 2,
            feat_d: 105,
            filters: 64,
            class_count: 21,
        }
    }

    pub fn shrec_coarse() -> Self {
        Self {
            name: "SHREC_coarse",
            class_count: 14,
            ..Self::shrec()
        }
    }

    pub fn shrec_fine() -> Self {
        Self {
            name: "SHREC_fine",
            class_count: 28,
            ..Self::shrec()
        }
    }

    fn shrec() -> Self {
        Self {
            name: "SHREC",
            frame_l: 32,
            joint_n: 22,
            joint_d: 3,
            feat_d: 231,
            filters: 64,
            class_count: 0,
        }
    }

    /// Returns the configuration of a model trained on this dataset.
    pub fn model_config(&self) -> PoseNetConfig {
        PoseNetConfig {
            frame_l: self.frame_l,
            joint_n: self.joint_n,
            joint_d: self.joint_d,
            feat_d: self.feat_d,
            filters: self.filters,
            class_count: self.class_count,
        }
    }
}
