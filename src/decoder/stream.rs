// src/decoder/stream.rs

use anyhow::anyhow;
use ringbuf::traits::Producer as RbProducer;
use rubato::{Resampler, SincFixedIn};
use std::fs::File;
use std::io::Read;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{channel, Receiver, Sender, TryRecvError},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, ReadOnlySource};
use symphonia::default::get_codecs;

use super::{control::DecoderCmd, dsp, output, probe, resample};
use crate::loader::{open_http, Location};

/// Shared between the decode thread, the audio callback and the element.
/// Times are seconds stored as `f64` bits.
#[derive(Debug)]
pub struct StreamStatus {
    position: AtomicU64,
    duration: AtomicU64,
    decoded_frames: AtomicU64,
    source_rate: AtomicU64,
    /// Set by the element on seek; the callback drops buffered audio until
    /// the decoder clears it.
    pub flushing: AtomicBool,
    /// Raised by the callback after a flushing pass left the ring empty.
    pub drained: AtomicBool,
    pub ready: AtomicBool,
    pub eof: AtomicBool,
    /// Set by the callback when it ran dry after `eof`.
    pub ended: AtomicBool,
    pub failed: AtomicBool,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            position: AtomicU64::new(0f64.to_bits()),
            duration: AtomicU64::new(f64::NAN.to_bits()),
            decoded_frames: AtomicU64::new(0),
            source_rate: AtomicU64::new(0),
            flushing: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            eof: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }
}

impl StreamStatus {
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, seconds: f64) {
        self.position.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set_position(self.position() + seconds);
    }

    /// `NaN` until the stream is probed, `INFINITY` when the length is unknown.
    pub fn duration(&self) -> f64 {
        f64::from_bits(self.duration.load(Ordering::Relaxed))
    }

    /// End of the range that has been decoded so far.
    pub fn seekable_end(&self) -> f64 {
        let rate = self.source_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.decoded_frames.load(Ordering::Relaxed) as f64 / rate as f64
    }
}

/// Lets a `Send`-only reader satisfy symphonia's `Sync` bound.
struct SyncReader<R>(Mutex<R>);

impl<R: Read> Read for SyncReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0
            .get_mut()
            .map_err(|_| std::io::Error::other("reader poisoned"))?
            .read(buf)
    }
}

fn open_media(location: &Location) -> anyhow::Result<Box<dyn MediaSource>> {
    Ok(match location {
        Location::File(path) => Box::new(File::open(path)?),
        Location::Http(url) => {
            let (response, _) = open_http(url)?;
            Box::new(ReadOnlySource::new(SyncReader(Mutex::new(response))))
        }
    })
}

pub struct StreamDecoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    location: Location,
    producer: P,
    status: Arc<StreamStatus>,
    output_channels: usize,
    output_sample_rate: u32,
    rate: f64,
    cmd_rx: Receiver<DecoderCmd>,
    post_seek_fade_samples: usize,
    pending: Vec<f32>,
}

impl<P> StreamDecoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            let status = self.status.clone();
            if let Err(e) = self.run() {
                log::error!("stream decoder: {e}");
                status.failed.store(true, Ordering::Relaxed);
            }
        })
    }

    fn build_resampler(&self, src_rate: u32) -> anyhow::Result<Option<SincFixedIn<f32>>> {
        if self.rate == 1.0 {
            return resample::build_resampler(src_rate, self.output_sample_rate, self.output_channels);
        }
        let ratio = self.output_sample_rate as f64 / (src_rate as f64 * self.rate);
        resample::build_resampler_ratio(ratio, self.output_channels).map(Some)
    }

    /// Moves as much of `pending` into the ring as fits.
    fn drain_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let n = output::push_with_fade(
            &mut self.producer,
            &self.pending,
            &mut self.post_seek_fade_samples,
        );
        self.pending.drain(..n);
    }

    fn run(mut self) -> anyhow::Result<()> {
        let source = open_media(&self.location)?;
        let extension = self.location.extension();
        let mut format = probe(source, extension.as_deref())?;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default audio track"))?;
        let track_id = track.id;
        let src_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("missing sample rate"))?;
        let duration = match track.codec_params.n_frames {
            Some(n) if !self.location.is_remote() => n as f64 / src_rate as f64,
            _ => f64::INFINITY,
        };
        self.status.source_rate.store(src_rate as u64, Ordering::Relaxed);
        self.status.duration.store(duration.to_bits(), Ordering::Relaxed);
        log::info!(
            "streaming {:?}: {} Hz, duration {:.2}s",
            self.location,
            src_rate,
            duration
        );

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut resampler = self.build_resampler(src_rate)?;
        let mut stage_planar: Vec<Vec<f32>> = vec![Vec::with_capacity(4096); self.output_channels];

        loop {
            loop {
                let cmd = match self.cmd_rx.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Ok(()),
                };
                match cmd {
                    DecoderCmd::Seek(target) => {
                        let time = symphonia::core::units::Time::new(
                            target.as_secs(),
                            target.subsec_nanos() as f64 / 1_000_000_000f64,
                        );
                        let seek = format.seek(
                            SeekMode::Accurate,
                            SeekTo::Time {
                                time,
                                track_id: Some(track_id),
                            },
                        );
                        if let Err(e) = seek {
                            log::warn!("stream seek to {target:?} failed: {e}");
                        }
                        decoder.reset();
                        sample_buf = None;
                        self.pending.clear();
                        for ch in &mut stage_planar {
                            ch.clear();
                        }
                        if let Some(r) = &mut resampler {
                            r.reset();
                        }
                        self.post_seek_fade_samples =
                            dsp::fade_samples_ms(self.output_sample_rate, 10) * self.output_channels;

                        // Nothing is pushed from here on, so the next drained
                        // pass of the callback leaves the ring empty.
                        self.status.drained.store(false, Ordering::Release);
                        let deadline = Instant::now() + Duration::from_millis(250);
                        while !self.status.drained.load(Ordering::Acquire)
                            && Instant::now() < deadline
                        {
                            thread::sleep(Duration::from_millis(2));
                        }
                        self.status.set_position(target.as_secs_f64());
                        self.status.eof.store(false, Ordering::Relaxed);
                        self.status.ended.store(false, Ordering::Relaxed);
                        self.status.flushing.store(false, Ordering::Release);
                    }
                    DecoderCmd::SetRate(rate) => {
                        self.rate = rate;
                        resampler = self.build_resampler(src_rate)?;
                    }
                    DecoderCmd::Stop => return Ok(()),
                }
            }

            self.drain_pending();
            if !self.pending.is_empty() || self.status.eof.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
                continue;
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(e) => {
                    if !matches!(e, SymphoniaError::IoError(_)) {
                        log::debug!("stream ended: {e}");
                    }
                    self.flush_tail(&mut resampler, &mut stage_planar)?;
                    self.status.eof.store(true, Ordering::Relaxed);
                    continue;
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            let spec = *decoded.spec();
            let decoded_ch = spec.channels.count();
            let frames = decoded.frames();
            let too_small = sample_buf
                .as_ref()
                .is_none_or(|buf| buf.capacity() < decoded.capacity() * decoded_ch);
            if too_small {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let mixed = dsp::updown_mix_interleaved(buf.samples(), decoded_ch, self.output_channels);
            match resampler.as_mut() {
                Some(r) => {
                    dsp::append_interleaved_to_planar(&mixed, &mut stage_planar);
                    while let Some(block) = resample::try_process_exact(r, &mut stage_planar) {
                        self.pending.extend(dsp::interleave(&block));
                    }
                }
                None => self.pending.extend(mixed),
            }

            self.status
                .decoded_frames
                .fetch_add(frames as u64, Ordering::Relaxed);
            self.status.ready.store(true, Ordering::Release);
        }
    }

    fn flush_tail(
        &mut self,
        resampler: &mut Option<SincFixedIn<f32>>,
        stage_planar: &mut [Vec<f32>],
    ) -> anyhow::Result<()> {
        let Some(r) = resampler.as_mut() else {
            return Ok(());
        };
        if let Some(mut planar) = resample::drain_remaining_planar(stage_planar) {
            let out = resample::process_partial_some(r, &mut planar)?;
            self.pending.extend(dsp::interleave(&out));
        }
        let out = resample::process_partial_none(r)?;
        self.pending.extend(dsp::interleave(&out));
        // Nothing decoded still counts as ready so the element can report
        // an empty clip instead of hanging.
        self.status.ready.store(true, Ordering::Release);
        Ok(())
    }
}

/// Starts decoding `location` into `producer`. The returned sender controls
/// seeking, rate and shutdown.
pub fn spawn_stream_decoder<P>(
    location: Location,
    producer: P,
    status: Arc<StreamStatus>,
    output_channels: usize,
    output_sample_rate: u32,
    rate: f64,
) -> (JoinHandle<()>, Sender<DecoderCmd>)
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    let (tx, rx) = channel();
    let handle = StreamDecoder {
        location,
        producer,
        status,
        output_channels,
        output_sample_rate,
        rate,
        cmd_rx: rx,
        post_seek_fade_samples: 0,
        pending: Vec::new(),
    }
    .spawn();
    (handle, tx)
}
