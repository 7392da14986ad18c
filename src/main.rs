fn main() -> anyhow::Result<()> {
    index_registry::run()
}
