//! vmux-cli - H.264/HEVC Annex B 基本流转分片 MP4
//!
//! 以固定大小的分片读取输入 (模拟网络分片), 经访问单元切分器与直播流水线,
//! 输出初始化分段与媒体分片. 可写成单个 fMP4 文件, 或拆分为 `init.mp4` + `seg-N.m4s`.

mod logging;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use vmux_codec::{AccessUnitSlicer, NalCodec, StreamConfig};
use vmux_format::{LivePipeline, RemuxerConfig, VecSink};

/// 默认读取分片大小
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(name = "vmux-cli", version, about = "H.264/HEVC 基本流转分片 MP4")]
struct Cli {
    /// 输入文件路径 ("-" 表示标准输入)
    #[arg(short, long)]
    input: String,

    /// 输出 fMP4 文件路径
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 编码标准 (h264 / hevc), 缺省时由扩展名推断
    #[arg(long)]
    codec: Option<NalCodec>,

    /// JSON 配置文件, 命令行参数优先
    #[arg(long)]
    config: Option<PathBuf>,

    /// 每帧时长 (tick)
    #[arg(long = "time-base")]
    time_base: Option<u32>,

    /// 时间刻度 (每秒 tick 数)
    #[arg(long)]
    timescale: Option<u32>,

    /// 每个分片的样本数
    #[arg(long = "frag-size")]
    frag_size: Option<usize>,

    /// 图像宽度 (缺省从 SPS 推导)
    #[arg(long)]
    width: Option<u32>,

    /// 图像高度 (缺省从 SPS 推导)
    #[arg(long)]
    height: Option<u32>,

    /// 每次读取的字节数
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// 拆分输出目录 (init.mp4 + seg-N.m4s)
    #[arg(long = "split-dir")]
    split_dir: Option<PathBuf>,

    /// 以 JSON 输出摘要
    #[arg(long)]
    json: bool,

    /// 日志文件目录
    #[arg(long = "log-dir")]
    log_dir: Option<PathBuf>,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// JSON 配置文件
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    codec: Option<NalCodec>,
    stream: StreamConfig,
    remuxer: RemuxerConfig,
}

/// 合并后的运行参数
#[derive(Debug)]
struct Settings {
    codec: NalCodec,
    stream: StreamConfig,
    remuxer: RemuxerConfig,
}

/// 处理摘要
#[derive(Debug, Serialize)]
struct Summary {
    codec: NalCodec,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec_string: Option<String>,
    width: u32,
    height: u32,
    access_units: usize,
    init_segments: usize,
    fragments: usize,
    key_fragments: usize,
    bytes: usize,
    errors: usize,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("vmux-cli", cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("警告: {e:#}");
    }

    match run(&cli) {
        Ok(summary) => {
            if let Err(e) = print_summary(&summary, cli.json) {
                eprintln!("错误: {e:#}");
                process::exit(1);
            }
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("错误: {e:#}");
            process::exit(1);
        }
    }
}

/// 执行一次转换
fn run(cli: &Cli) -> Result<Summary> {
    if cli.output.is_none() && cli.split_dir.is_none() {
        bail!("必须指定输出文件 (-o) 或拆分目录 (--split-dir)");
    }
    let settings = resolve_settings(cli)?;
    info!(
        "输入: {}, codec={}, time_base={}, timescale={}, frag_size={}",
        cli.input,
        settings.codec,
        settings.stream.time_base,
        settings.remuxer.timescale,
        settings.stream.frag_size
    );

    let reader: Box<dyn Read> = if cli.input == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(&cli.input).with_context(|| format!("无法打开输入文件 '{}'", cli.input))?)
    };

    let (sink, access_units, errors, width, height) = remux_stream(reader, &settings, cli.chunk_size)?;

    if let Some(path) = &cli.output {
        write_single_file(path, &sink)?;
    }
    if let Some(dir) = &cli.split_dir {
        write_split(dir, &sink)?;
    }

    Ok(Summary {
        codec: settings.codec,
        codec_string: sink.codec_strings.last().cloned(),
        width,
        height,
        access_units,
        init_segments: sink.init_segments.len(),
        fragments: sink.fragments.len(),
        key_fragments: sink.key_fragment_count(),
        bytes: sink.total_bytes(),
        errors,
    })
}

/// 合并配置文件与命令行参数
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let codec = match cli.codec.or(file.codec) {
        Some(codec) => codec,
        None => codec_from_path(&cli.input)
            .with_context(|| format!("无法从输入 '{}' 推断编码标准, 请使用 --codec", cli.input))?,
    };

    let mut stream = file.stream;
    let mut remuxer = file.remuxer;
    if let Some(time_base) = cli.time_base {
        stream.time_base = time_base;
    }
    // 两个配置的 time_base 必须一致, 以流配置为准
    remuxer.time_base = stream.time_base;
    if let Some(timescale) = cli.timescale {
        remuxer.timescale = timescale;
    }
    if let Some(frag_size) = cli.frag_size {
        stream.frag_size = frag_size;
    }
    if let Some(width) = cli.width {
        stream.width = width;
    }
    if let Some(height) = cli.height {
        stream.height = height;
    }
    if stream.time_base == 0 || remuxer.timescale == 0 {
        bail!("time_base 与 timescale 必须大于 0");
    }

    Ok(Settings {
        codec,
        stream,
        remuxer,
    })
}

/// 读取 JSON 配置文件
fn load_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件 '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("配置文件格式错误 '{}'", path.display()))
}

/// 由扩展名推断编码标准
fn codec_from_path(path: &str) -> Option<NalCodec> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "h264" | "264" | "avc" | "jsv" => Some(NalCodec::H264),
        "h265" | "265" | "hevc" => Some(NalCodec::Hevc),
        _ => None,
    }
}

/// 分片读取输入, 切分访问单元并送入流水线
///
/// 返回 (输出, 访问单元数, 错误数, 宽, 高). 流格式错误只记录不中断.
fn remux_stream(
    mut reader: impl Read,
    settings: &Settings,
    chunk_size: usize,
) -> Result<(VecSink, usize, usize, u32, u32)> {
    let mut slicer = AccessUnitSlicer::new(settings.codec);
    let mut pipeline =
        LivePipeline::new(settings.codec, settings.stream, settings.remuxer, VecSink::new());
    let mut access_units = 0;
    let mut errors = 0;

    let mut feed = |pipeline: &mut LivePipeline<VecSink>, units: Vec<Vec<u8>>| {
        for unit in units {
            access_units += 1;
            if let Err(e) = pipeline.push_data(&unit) {
                errors += 1;
                warn!("访问单元 #{access_units} 处理失败: {e}");
            }
        }
    };

    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("读取输入失败"),
        };
        let units = slicer.push(&buf[..n]);
        feed(&mut pipeline, units);
    }
    let units = slicer.flush();
    feed(&mut pipeline, units);
    if let Err(e) = pipeline.flush() {
        errors += 1;
        warn!("流结束时封装剩余样本失败: {e}");
    }

    let (width, height) = (pipeline.track().width, pipeline.track().height);
    Ok((pipeline.into_sink(), access_units, errors, width, height))
}

/// 初始化分段与所有分片写入同一个文件
fn write_single_file(path: &Path, sink: &VecSink) -> Result<()> {
    let file = File::create(path).with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    for init in &sink.init_segments {
        writer.write_all(init)?;
    }
    for (fragment, _) in &sink.fragments {
        writer.write_all(fragment)?;
    }
    writer.flush()?;
    info!("输出: {}, {} 字节", path.display(), sink.total_bytes());
    Ok(())
}

/// 拆分输出: init.mp4 (多个流代时为 init-N.mp4) + seg-N.m4s
fn write_split(dir: &Path, sink: &VecSink) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录 '{}'", dir.display()))?;
    for (i, init) in sink.init_segments.iter().enumerate() {
        let name = if i == 0 {
            "init.mp4".to_string()
        } else {
            format!("init-{i}.mp4")
        };
        std::fs::write(dir.join(name), init)?;
    }
    for (i, (fragment, _)) in sink.fragments.iter().enumerate() {
        std::fs::write(dir.join(format!("seg-{}.m4s", i + 1)), fragment)?;
    }
    info!(
        "输出目录: {}, {} 个分片",
        dir.display(),
        sink.fragments.len()
    );
    Ok(())
}

fn print_summary(summary: &Summary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("编码:       {}", summary.codec);
    if let Some(codec_string) = &summary.codec_string {
        println!("编码字符串: {codec_string}");
    }
    println!("尺寸:       {}x{}", summary.width, summary.height);
    println!("访问单元:   {}", summary.access_units);
    println!("初始化分段: {}", summary.init_segments);
    println!(
        "分片:       {} (含关键帧 {})",
        summary.fragments, summary.key_fragments
    );
    println!("总字节数:   {}", summary.bytes);
    if summary.errors > 0 {
        println!("错误:       {}", summary.errors);
    }
    Ok(())
}
