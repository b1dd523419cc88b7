use mumot_index::{
    IndexError, InteractionGraph, NeighborhoodIndex, NetworkType, Pose, Topology,
    TopologyRequest, TorusGridIndex, generate_topology, torus_distance,
};
use rand::{SeedableRng, rngs::SmallRng};

fn request(network: NetworkType, population: usize, param: Option<f64>) -> TopologyRequest {
    TopologyRequest {
        network,
        population,
        param,
        max_connect_attempts: 1000,
        arena: (1.0, 1.0),
    }
}

fn static_graph(topology: Topology) -> InteractionGraph {
    match topology {
        Topology::Static(graph) => graph,
        Topology::Mobile { .. } => panic!("expected a static topology"),
    }
}

#[test]
fn erdos_renyi_topologies_are_always_connected() {
    for seed in 0..25u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let graph = static_graph(
            generate_topology(&request(NetworkType::ErdosRenyi, 40, Some(0.08)), &mut rng)
                .expect("connected graph"),
        );
        assert_eq!(graph.node_count(), 40);
        assert!(graph.is_connected(), "seed {seed} produced a disconnected graph");
    }
}

#[test]
fn barabasi_albert_rejects_too_many_edges_per_node() {
    let mut rng = SmallRng::seed_from_u64(5);
    let err = generate_topology(&request(NetworkType::BarabasiAlbert, 10, Some(10.0)), &mut rng)
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidParameter(_)), "{err:?}");

    let err = generate_topology(&request(NetworkType::BarabasiAlbert, 10, Some(0.0)), &mut rng)
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidParameter(_)), "{err:?}");
}

#[test]
fn barabasi_albert_uses_default_param() {
    let mut rng = SmallRng::seed_from_u64(6);
    let graph = static_graph(
        generate_topology(&request(NetworkType::BarabasiAlbert, 20, None), &mut rng)
            .expect("graph"),
    );
    assert_eq!(graph.edge_count(), (20 - 3) * 3);
}

#[test]
fn same_seed_gives_same_graph() {
    let build = || {
        let mut rng = SmallRng::seed_from_u64(77);
        static_graph(
            generate_topology(&request(NetworkType::ErdosRenyi, 30, Some(0.2)), &mut rng)
                .expect("graph"),
        )
        .edges()
    };
    assert_eq!(build(), build());
}

#[test]
fn moving_agent_reappears_on_the_opposite_side() {
    let pose = Pose::new(0.995, 0.002, 0.0);
    let moved = pose.advance(0.0, 0.01, 1.0, 1.0, 1.0);
    assert!((moved.x - 0.005).abs() < 1e-9, "x = {}", moved.x);

    let down = Pose::new(0.5, 0.002, -std::f64::consts::FRAC_PI_2);
    let moved = down.advance(0.0, 0.01, 1.0, 1.0, 1.0);
    assert!((moved.y - 0.992).abs() < 1e-9, "y = {}", moved.y);
}

#[test]
fn neighbors_across_the_boundary_use_wraparound_distance() {
    let points = [(0.02, 0.5), (0.98, 0.5), (0.5, 0.5)];
    assert!((torus_distance(points[0], points[1], 1.0, 1.0) - 0.04).abs() < 1e-12);

    let mut index = TorusGridIndex::new(0.05, 1.0, 1.0);
    index.rebuild(&points).expect("rebuild");
    let mut found = Vec::new();
    index.neighbors_within(0, 0.05, &mut |other, dist| found.push((other, dist.into_inner())));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 1);
    assert!((found[0].1 - 0.04).abs() < 1e-12);
}
