//! Criterion benchmarks for the sigtap frame path
//!
//! Run with: cargo bench -p sigtap-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use parking_lot::Mutex;
use sigtap_core::{
    AlgoMode, AlgorithmPluginBuilder, AudioFrame, ErrorHandler, FrameKind, HostError,
    InterceptFlags, InterceptionCallback, InterceptionToken, LinkDirection, MediaEvent,
    MediaInterception, Module, MutePolicy, Observer, ProcessorHandle, Session, StreamFormat,
    WorkingFlags,
};
use std::sync::Arc;

const SAMPLE_RATE: u32 = 16000;
const FRAME_SIZES: &[usize] = &[80, 160, 320, 640];

struct BenchCall;

impl Session for BenchCall {
    fn id(&self) -> &str {
        "bench"
    }
}

/// Hands the registered callback back to the benchmark.
#[derive(Default)]
struct CaptureHost {
    slot: Mutex<Option<Box<dyn InterceptionCallback>>>,
}

impl MediaInterception for CaptureHost {
    fn register(
        &self,
        _: &Arc<dyn Session>,
        _: &str,
        _: InterceptFlags,
        callback: Box<dyn InterceptionCallback>,
    ) -> Result<InterceptionToken, HostError> {
        *self.slot.lock() = Some(callback);
        Ok(InterceptionToken(0))
    }

    fn remove(&self, _: InterceptionToken) -> Result<(), HostError> {
        self.slot.lock().take();
        Ok(())
    }
}

fn attached(
    frame_size: usize,
    policy: MutePolicy,
) -> (Module, ProcessorHandle, Box<dyn InterceptionCallback>) {
    let host = Arc::new(CaptureHost::default());
    let mut module = Module::new("mod_bench");
    let plugin = AlgorithmPluginBuilder::<f32>::new()
        .construct(|_, _| Ok(0.5))
        .initialize(|_, _| Ok(()))
        .process(|gain, frame, _| {
            for s in frame.samples_mut() {
                *s = (f32::from(*s) * *gain) as i16;
            }
        })
        .terminate(|_| Ok(()));
    let app = module.create_sigproc_app(host.clone(), plugin).unwrap();
    app.config()
        .set_working_channel(LinkDirection::Uplink, WorkingFlags::Default)
        .unwrap();
    app.config().set_mute_policy(policy).unwrap();
    module.init_check().unwrap();

    let handle = app.produce_instance(Arc::new(BenchCall), "").unwrap();
    let mut callback = host.slot.lock().take().unwrap();
    callback.on_event(MediaEvent::Attached(StreamFormat::mono(SAMPLE_RATE, frame_size)));
    (module, handle, callback)
}

fn generate_frame(size: usize) -> Vec<i16> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 16000.0) as i16
        })
        .collect()
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame");

    for &frame_size in FRAME_SIZES {
        let input = generate_frame(frame_size);

        for (label, mode, policy) in [
            ("on", AlgoMode::On, MutePolicy::Bypass),
            ("off", AlgoMode::Off, MutePolicy::Bypass),
            ("mute_discard", AlgoMode::Mute, MutePolicy::ProcessDiscard),
        ] {
            group.bench_with_input(BenchmarkId::new(label, frame_size), &frame_size, |b, _| {
                let (_module, handle, mut callback) = attached(frame_size, policy);
                handle.set_mode(mode).unwrap();
                let mut buf = input.clone();
                b.iter(|| {
                    buf.copy_from_slice(&input);
                    let frame = AudioFrame::new(LinkDirection::Uplink, SAMPLE_RATE, 1, &mut buf);
                    black_box(callback.on_event(MediaEvent::Frame(FrameKind::ReadReplace, frame)));
                });
            });
        }
    }

    group.finish();
}

fn bench_observer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Observer");

    for &listeners in &[1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("notify", listeners),
            &listeners,
            |b, &listeners| {
                let obs: Observer<u32> = Observer::new(Arc::new(ErrorHandler::new()));
                for _ in 0..listeners {
                    obs.add(|v| {
                        black_box(*v);
                    })
                    .unwrap();
                }
                b.iter(|| obs.notify(black_box(&7)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_frames, bench_observer);
criterion_main!(benches);
