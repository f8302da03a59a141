//! Mesh bootstrap on localhost.

use std::net::TcpListener;
use std::thread;

use gatevm::channel::Channel;
use gatevm::cluster::{ClusterNetwork, WorkerSpec};

/// Picks `n` currently-free localhost ports.
fn free_ports(n: usize) -> Vec<u16> {
    let listeners: Vec<TcpListener> = (0..n)
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

fn localhost_workers(ports: &[u16]) -> Vec<WorkerSpec> {
    ports
        .iter()
        .map(|port| WorkerSpec {
            internal_host: "127.0.0.1".to_string(),
            internal_port: port.to_string(),
        })
        .collect()
}

#[test]
fn three_worker_mesh_is_fully_connected() {
    let workers = localhost_workers(&free_ports(3));
    let num_workers = workers.len() as u32;

    let handles: Vec<_> = (0..num_workers)
        .map(|i| {
            let workers = workers.clone();
            thread::spawn(move || {
                let mut net = ClusterNetwork::establish(i, &workers).unwrap();
                assert_eq!(3, net.num_workers());
                assert!(net.contact_worker(i).is_none());

                // every ordered pair exchanges a sentinel byte
                for j in 0..num_workers {
                    if j == i {
                        continue;
                    }
                    let channel = net.contact_worker(j).unwrap();
                    channel.send_byte(0x40 + i as u8).unwrap();
                    channel.flush().unwrap();
                }
                for j in 0..num_workers {
                    if j == i {
                        continue;
                    }
                    let channel = net.contact_worker(j).unwrap();
                    assert_eq!(0x40 + j as u8, channel.recv_byte().unwrap());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn two_worker_mesh_carries_blocks() {
    use gatevm::block::Block;

    let workers = localhost_workers(&free_ports(2));
    let block = Block::pack(0xfeed, 0xface);

    let receiver = {
        let workers = workers.clone();
        thread::spawn(move || {
            let mut net = ClusterNetwork::establish(0, &workers).unwrap();
            net.contact_worker(1).unwrap().recv_block().unwrap()
        })
    };
    let mut net = ClusterNetwork::establish(1, &workers).unwrap();
    let channel = net.contact_worker(0).unwrap();
    channel.send_block(block).unwrap();
    channel.flush().unwrap();

    assert_eq!(block, receiver.join().unwrap());
}
