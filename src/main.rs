fn main() {
    if let Err(err) = nodegraph_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
