fn main() {
    if let Err(e) = posture_lib::run() {
        eprintln!("posture-sentinel: {}", e);
        std::process::exit(1);
    }
}
