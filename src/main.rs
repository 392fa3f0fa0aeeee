fn main() -> anyhow::Result<()> {
    cortexflow_lib::run()
}
