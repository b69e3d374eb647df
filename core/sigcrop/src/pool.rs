use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use image::GrayImage;
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::SigCropError;
use crate::result::CropResult;
use crate::SignatureCropper;

/// Bounded thread pool for running detections off the caller's thread.
///
/// Each image is processed by exactly one worker; the pool only bounds how
/// many images are in flight at once.
pub struct DetectionPool {
    pool: ThreadPool,
    cropper: Arc<SignatureCropper>,
}

impl DetectionPool {
    /// Build a pool sized from the cropper's `runtime.worker_threads`
    /// (`0` lets rayon pick one thread per core).
    pub fn new(cropper: SignatureCropper) -> Result<Self, SigCropError> {
        let threads = cropper.detector_config().runtime.worker_threads;
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("sigcrop-{i}"));
        if threads > 0 {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| SigCropError::PoolBuild(e.to_string()))?;
        debug!("detection pool with {} threads", pool.current_num_threads());

        Ok(Self {
            pool,
            cropper: Arc::new(cropper),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Detect every image on the pool and wait for all results, in input order.
    pub fn detect_batch(&self, images: &[GrayImage]) -> Vec<CropResult> {
        let cropper = &self.cropper;
        self.pool
            .install(|| images.par_iter().map(|image| cropper.detect_image(image)).collect())
    }

    /// Queue one image and return a receiver for its result.
    pub fn submit(&self, image: GrayImage) -> Receiver<CropResult> {
        let (tx, rx) = mpsc::channel();
        let cropper = Arc::clone(&self.cropper);
        self.pool.spawn(move || {
            // The caller may have dropped the receiver; nothing to report then.
            let _ = tx.send(cropper.detect_image(&image));
        });
        rx
    }
}
